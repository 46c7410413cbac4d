use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::ExchangeProfile;
use crate::core::types::{MarketType, Quote};
use crate::error::Result;
use crate::exchanges::{array_at, collect_quotes, ExchangeAdapter, ExchangeContext, RawTicker};
use crate::utils::{de_number, de_opt_number, parse_number};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpotTicker {
    symbol: String,
    #[serde(deserialize_with = "de_number")]
    bid: f64,
    #[serde(deserialize_with = "de_number")]
    ask: f64,
    #[serde(default, deserialize_with = "de_opt_number")]
    bid_size: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    ask_size: Option<f64>,
}

/// 合约盘口为 `[价格, 数量]`
#[derive(Debug, Deserialize)]
struct ContractTick {
    #[serde(alias = "symbol")]
    contract_code: String,
    #[serde(default)]
    bid: Vec<Value>,
    #[serde(default)]
    ask: Vec<Value>,
}

fn level(side: &[Value]) -> (Option<f64>, Option<f64>) {
    (
        side.first().and_then(parse_number),
        side.get(1).and_then(parse_number),
    )
}

pub fn parse_spot(exchange: &str, data: Value) -> Vec<Quote> {
    collect_quotes(exchange, MarketType::Spot, array_at(data, "/data"), |t: SpotTicker| {
        Some(RawTicker::new(t.symbol, t.bid, t.ask).volumes(t.bid_size, t.ask_size))
    })
}

/// 批量接口返回 `ticks` 数组，单合约接口返回 `tick` 对象
pub fn parse_futures(exchange: &str, data: Value) -> Vec<Quote> {
    let entries = if data.get("ticks").map_or(false, Value::is_array) {
        array_at(data, "/ticks")
    } else if let Some(tick) = data.get("tick").filter(|t| t.is_object()) {
        vec![tick.clone()]
    } else {
        Vec::new()
    };

    collect_quotes(exchange, MarketType::Futures, entries, |t: ContractTick| {
        let (bid, bid_volume) = level(&t.bid);
        let (ask, ask_volume) = level(&t.ask);
        Some(RawTicker::new(t.contract_code, bid?, ask?).volumes(bid_volume, ask_volume))
    })
}

pub struct HtxExchange {
    ctx: ExchangeContext,
}

impl From<ExchangeContext> for HtxExchange {
    fn from(ctx: ExchangeContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ExchangeAdapter for HtxExchange {
    fn id(&self) -> &str {
        self.ctx.id()
    }

    fn profile(&self) -> &ExchangeProfile {
        &self.ctx.profile
    }

    async fn get_spot_prices(&self) -> Result<Vec<Quote>> {
        let data = self.ctx.fetch_spot().await?;
        Ok(parse_spot(self.id(), data))
    }

    async fn get_futures_prices(&self) -> Result<Vec<Quote>> {
        Ok(match self.ctx.fetch_futures().await? {
            Some(data) => parse_futures(self.id(), data),
            None => Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_spot_lowercase_symbols() {
        let data = json!({
            "status": "ok",
            "data": [
                {"symbol": "btcusdt", "bid": 65000.1, "bidSize": 0.25, "ask": 65000.4, "askSize": 0.5},
                {"symbol": "ethbtc", "bid": 0.046, "ask": 0.0461}
            ]
        });
        let quotes = parse_spot("htx", data);
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].symbol, "BTC");
        assert_eq!(quotes[0].original_symbol, "btcusdt");
        assert_eq!(quotes[0].ask_volume, Some(0.5));
        assert_eq!(quotes[1].symbol, "ETH");
    }

    #[test]
    fn test_parse_batch_merged_ticks() {
        let data = json!({
            "status": "ok",
            "ticks": [
                {"contract_code": "BTC-USDT", "bid": [65010.0, 30], "ask": [65010.5, 12]},
                {"contract_code": "ETH-USDT", "bid": [], "ask": [3000.1, 1]}
            ]
        });
        let quotes = parse_futures("htx", data);
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol, "BTC");
        assert_eq!(quotes[0].bid, 65010.0);
        assert_eq!(quotes[0].bid_volume, Some(30.0));
        assert_eq!(quotes[0].ask_volume, Some(12.0));
    }

    #[test]
    fn test_parse_single_tick() {
        let data = json!({
            "status": "ok",
            "tick": {"symbol": "SOL-USDT", "bid": ["150.1", "4"], "ask": ["150.3", "2"]}
        });
        let quotes = parse_futures("htx", data);
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol, "SOL");
        assert_eq!(quotes[0].ask, 150.3);
    }
}
