use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::ExchangeProfile;
use crate::core::types::{MarketType, Quote};
use crate::error::Result;
use crate::exchanges::{array_at, collect_quotes, ExchangeAdapter, ExchangeContext, RawTicker};
use crate::utils::{de_number, de_opt_number};

/// v5 行情接口，现货和线性合约共用同一结构 `result.list`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker {
    symbol: String,
    #[serde(rename = "bid1Price", deserialize_with = "de_number")]
    bid: f64,
    #[serde(rename = "ask1Price", deserialize_with = "de_number")]
    ask: f64,
    #[serde(rename = "bid1Size", default, deserialize_with = "de_opt_number")]
    bid_size: Option<f64>,
    #[serde(rename = "ask1Size", default, deserialize_with = "de_opt_number")]
    ask_size: Option<f64>,
}

pub fn parse_tickers(exchange: &str, market_type: MarketType, data: Value) -> Vec<Quote> {
    collect_quotes(exchange, market_type, array_at(data, "/result/list"), |t: Ticker| {
        Some(RawTicker::new(t.symbol, t.bid, t.ask).volumes(t.bid_size, t.ask_size))
    })
}

pub struct BybitExchange {
    ctx: ExchangeContext,
}

impl From<ExchangeContext> for BybitExchange {
    fn from(ctx: ExchangeContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ExchangeAdapter for BybitExchange {
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
    fn test_parse_v5_tickers() {
        let data = json!({
            "retCode": 0,
            "retMsg": "OK",
            "result": {
                "category": "linear",
                "list": [
                    {"symbol": "BTCUSDT", "bid1Price": "65010.5", "bid1Size": "2.1", "ask1Price": "65011.0", "ask1Size": "0.8", "lastPrice": "65010.9"},
                    {"symbol": "1000PEPEUSDT", "bid1Price": "0.0121", "ask1Price": "0.0122"},
                    {"symbol": "ETHPERP", "bid1Price": "", "ask1Price": "3001"}
                ]
            }
        });
        let quotes = parse_tickers("bybit", MarketType::Futures, data);
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].symbol, "BTC");
        assert_eq!(quotes[0].bid_volume, Some(2.1));
        // 数字前缀被去掉
        assert_eq!(quotes[1].symbol, "PEPE");
        assert_eq!(quotes[1].original_symbol, "1000PEPEUSDT");
        assert_eq!(quotes[1].bid_volume, None);
    }

    #[test]
    fn test_error_envelope_yields_nothing() {
        let data = json!({"retCode": 10001, "retMsg": "params error", "result": {}});
        assert!(parse_tickers("bybit", MarketType::Spot, data).is_empty());
    }
}
