use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::Value;

use crate::config::ExchangeProfile;
use crate::core::types::{MarketType, Quote};
use crate::error::Result;
use crate::exchanges::{collect_quotes, ExchangeAdapter, ExchangeContext, RawTicker};
use crate::utils::de_number;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker {
    symbol: String,
    #[serde(deserialize_with = "de_number")]
    highest_bid: f64,
    #[serde(deserialize_with = "de_number")]
    lowest_ask: f64,
}

/// `data` 是以交易对为键的对象，把键写回每条记录的 `symbol` 字段
fn keyed_entries(data: Value) -> Vec<Value> {
    let map = match data {
        Value::Object(mut root) => match root.remove("data") {
            Some(Value::Object(map)) => map,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    map.into_iter()
        .filter_map(|(symbol, entry)| match entry {
            Value::Object(mut fields) => {
                fields.insert("symbol".to_string(), Value::String(symbol));
                Some(Value::Object(fields))
            }
            _ => None,
        })
        .collect()
}

pub fn parse_spot(exchange: &str, data: Value) -> Vec<Quote> {
    collect_quotes(exchange, MarketType::Spot, keyed_entries(data), |t: Ticker| {
        Some(RawTicker::new(t.symbol, t.highest_bid, t.lowest_ask))
    })
}

/// 只有现货行情
pub struct CoinWExchange {
    ctx: ExchangeContext,
}

impl From<ExchangeContext> for CoinWExchange {
    fn from(ctx: ExchangeContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ExchangeAdapter for CoinWExchange {
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
        debug!("{}: futures market not available", self.id());
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchanges::test_support;
    use serde_json::json;

    #[test]
    fn test_parse_keyed_tickers() {
        let data = json!({
            "code": "200",
            "data": {
                "BTC_USDT": {"id": 1, "highestBid": "65000.2", "lowestAsk": "65001", "last": "65000.5"},
                "ETH_USDT": {"id": 2, "highestBid": "3001", "lowestAsk": "3000"},
                "DOT_USDT": "broken"
            }
        });
        let quotes = parse_spot("coinw", data);
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol, "BTC");
        assert_eq!(quotes[0].original_symbol, "BTC_USDT");
        assert_eq!(quotes[0].bid, 65000.2);
    }

    #[test]
    fn test_missing_data_yields_nothing() {
        assert!(parse_spot("coinw", json!({"code": "500"})).is_empty());
        assert!(parse_spot("coinw", json!([])).is_empty());
    }

    #[tokio::test]
    async fn test_spot_over_http() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/ticker")
            .with_status(200)
            .with_body(r#"{"code":"200","data":{"SOL_USDT":{"highestBid":"150.1","lowestAsk":"150.4"}}}"#)
            .create_async()
            .await;

        let url = format!("{}/ticker", server.url());
        let adapter = CoinWExchange::from(test_support::context("coinw", &url, None));
        let quotes = adapter.get_spot_prices().await.unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol, "SOL");
        assert!(adapter.get_futures_prices().await.unwrap().is_empty());
    }
}
