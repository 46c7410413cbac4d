use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::ExchangeProfile;
use crate::core::types::{MarketType, Quote};
use crate::error::Result;
use crate::exchanges::{array_at, collect_quotes, ExchangeAdapter, ExchangeContext, RawTicker};
use crate::utils::{de_number, de_opt_number};

/// v5 tickers，现货 `BTC-USDT`，交割合约 `BTC-USDT-240628`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker {
    inst_id: String,
    #[serde(deserialize_with = "de_number")]
    bid_px: f64,
    #[serde(deserialize_with = "de_number")]
    ask_px: f64,
    #[serde(default, deserialize_with = "de_opt_number")]
    bid_sz: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    ask_sz: Option<f64>,
}

pub fn parse_tickers(exchange: &str, market_type: MarketType, data: Value) -> Vec<Quote> {
    collect_quotes(exchange, market_type, array_at(data, "/data"), |t: Ticker| {
        Some(RawTicker::new(t.inst_id, t.bid_px, t.ask_px).volumes(t.bid_sz, t.ask_sz))
    })
}

pub struct OkxExchange {
    ctx: ExchangeContext,
}

impl From<ExchangeContext> for OkxExchange {
    fn from(ctx: ExchangeContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ExchangeAdapter for OkxExchange {
    fn id(&self) -> &str {
        self.ctx.id()
    }

    fn profile(&self) -> &ExchangeProfile {
        &self.ctx.profile
    }

    async fn get_spot_prices(&self) -> Result<Vec<Quote>> {
        let data = self.ctx.fetch_spot().await?;
        Ok(parse_tickers(self.id(), MarketType::Spot, data))
    }

    async fn get_futures_prices(&self) -> Result<Vec<Quote>> {
        Ok(match self.ctx.fetch_futures().await? {
            Some(data) => parse_tickers(self.id(), MarketType::Futures, data),
            None => Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_spot_tickers() {
        let data = json!({
            "code": "0",
            "msg": "",
            "data": [
                {"instType": "SPOT", "instId": "BTC-USDT", "last": "65000", "bidPx": "64999.9", "bidSz": "0.4", "askPx": "65000.1", "askSz": "1.2"},
                {"instType": "SPOT", "instId": "ETH-BTC", "bidPx": "0.046", "askPx": "0.0461"},
                {"instType": "SPOT", "instId": "XYZ-USDT", "bidPx": "", "askPx": ""}
            ]
        });
        let quotes = parse_tickers("okx", MarketType::Spot, data);
        let symbols: Vec<&str> = quotes.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTC", "ETH"]);
        assert_eq!(quotes[0].bid_volume, Some(0.4));
    }

    #[test]
    fn test_parse_swap_tickers() {
        let data = json!({
            "code": "0",
            "data": [
                {"instType": "SWAP", "instId": "SOL-USDT-SWAP", "bidPx": "150.1", "askPx": "150.2"}
            ]
        });
        let quotes = parse_tickers("okx", MarketType::Futures, data);
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol, "SOL");
        assert_eq!(quotes[0].original_symbol, "SOL-USDT-SWAP");
    }
}
