use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::ExchangeProfile;
use crate::core::types::{MarketType, Quote};
use crate::error::Result;
use crate::exchanges::{array_at, collect_quotes, ExchangeAdapter, ExchangeContext, RawTicker};
use crate::utils::{de_number, de_opt_number};

/// 现货和 U 本位合约的 bookTicker 都是扁平数组
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BookTicker {
    symbol: String,
    #[serde(deserialize_with = "de_number")]
    bid_price: f64,
    #[serde(deserialize_with = "de_number")]
    ask_price: f64,
    #[serde(default, deserialize_with = "de_opt_number")]
    bid_qty: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    ask_qty: Option<f64>,
}

impl BookTicker {
    pub(crate) fn into_raw(self) -> Option<RawTicker> {
        Some(RawTicker::new(self.symbol, self.bid_price, self.ask_price).volumes(self.bid_qty, self.ask_qty))
    }
}

pub fn parse_tickers(exchange: &str, market_type: MarketType, data: Value) -> Vec<Quote> {
    collect_quotes(exchange, market_type, array_at(data, ""), BookTicker::into_raw)
}

pub struct BinanceExchange {
    ctx: ExchangeContext,
}

impl From<ExchangeContext> for BinanceExchange {
    fn from(ctx: ExchangeContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ExchangeAdapter for BinanceExchange {
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
    use crate::exchanges::test_support;
    use serde_json::json;

    #[test]
    fn test_parse_book_ticker() {
        let data = json!([
            {"symbol": "BTCUSDT", "bidPrice": "65000.10", "bidQty": "1.5", "askPrice": "65000.20", "askQty": "0.3"},
            {"symbol": "ETHBUSD", "bidPrice": "3000", "bidQty": "2", "askPrice": "2999", "askQty": "1"},
            {"symbol": "DEADUSDT", "bidPrice": "0.00000000", "bidQty": "0", "askPrice": "0.00000000", "askQty": "0"}
        ]);
        let quotes = parse_tickers("binance", MarketType::Spot, data);
        assert_eq!(quotes.len(), 1);
        let btc = &quotes[0];
        assert_eq!(btc.symbol, "BTC");
        assert_eq!(btc.exchange, "binance");
        assert_eq!(btc.bid, 65000.10);
        assert_eq!(btc.ask, 65000.20);
        assert_eq!(btc.bid_volume, Some(1.5));
        assert_eq!(btc.ask_volume, Some(0.3));
    }

    #[test]
    fn test_non_array_payload_yields_nothing() {
        let data = json!({"code": -1121, "msg": "Invalid symbol."});
        assert!(parse_tickers("binance", MarketType::Futures, data).is_empty());
    }

    #[tokio::test]
    async fn test_fetches_spot_and_futures() {
        let mut server = mockito::Server::new_async().await;
        let _spot = server
            .mock("GET", "/api/v3/ticker/bookTicker")
            .with_status(200)
            .with_body(r#"[{"symbol":"ETHUSDT","bidPrice":"3000.1","askPrice":"3000.2"}]"#)
            .create_async()
            .await;
        let _futures = server
            .mock("GET", "/fapi/v1/ticker/bookTicker")
            .with_status(200)
            .with_body(r#"[{"symbol":"ETHUSDT","bidPrice":"3001.0","askPrice":"3001.5","bidQty":"4","askQty":"5"}]"#)
            .create_async()
            .await;

        let spot_url = format!("{}/api/v3/ticker/bookTicker", server.url());
        let futures_url = format!("{}/fapi/v1/ticker/bookTicker", server.url());
        let adapter = BinanceExchange::from(test_support::context("binance", &spot_url, Some(&futures_url)));

        let spot = adapter.get_spot_prices().await.unwrap();
        assert_eq!(spot.len(), 1);
        assert_eq!(spot[0].market_type, MarketType::Spot);

        let futures = adapter.get_prices(MarketType::Futures).await.unwrap();
        assert_eq!(futures.len(), 1);
        assert_eq!(futures[0].market_type, MarketType::Futures);
        assert_eq!(futures[0].symbol, "ETH");
        assert_eq!(futures[0].ask_volume, Some(5.0));
    }
}
