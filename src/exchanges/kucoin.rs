use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::ExchangeProfile;
use crate::core::types::{MarketType, Quote};
use crate::error::Result;
use crate::exchanges::{array_at, collect_quotes, ExchangeAdapter, ExchangeContext, RawTicker};
use crate::utils::{de_number, de_opt_number};

/// 现货 allTickers：`buy` 是最优买价，`sell` 是最优卖价
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpotTicker {
    symbol: String,
    #[serde(rename = "buy", deserialize_with = "de_number")]
    bid: f64,
    #[serde(rename = "sell", deserialize_with = "de_number")]
    ask: f64,
    #[serde(default, deserialize_with = "de_opt_number")]
    best_bid_size: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    best_ask_size: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FuturesTicker {
    symbol: String,
    #[serde(deserialize_with = "de_number")]
    best_bid_price: f64,
    #[serde(deserialize_with = "de_number")]
    best_ask_price: f64,
    #[serde(default, deserialize_with = "de_opt_number")]
    best_bid_size: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    best_ask_size: Option<f64>,
}

/// 合约符号形如 `XBTUSDTM`：去掉结尾的 `M`，`XBT` 换成 `BTC`
fn contract_alias(symbol: &str) -> String {
    let trimmed = symbol.strip_suffix('M').unwrap_or(symbol);
    match trimmed.strip_prefix("XBT") {
        Some(rest) => format!("BTC{}", rest),
        None => trimmed.to_string(),
    }
}

pub fn parse_spot(exchange: &str, data: Value) -> Vec<Quote> {
    collect_quotes(exchange, MarketType::Spot, array_at(data, "/data/ticker"), |t: SpotTicker| {
        Some(RawTicker::new(t.symbol, t.bid, t.ask).volumes(t.best_bid_size, t.best_ask_size))
    })
}

pub fn parse_futures(exchange: &str, data: Value) -> Vec<Quote> {
    collect_quotes(exchange, MarketType::Futures, array_at(data, "/data"), |t: FuturesTicker| {
        let alias = contract_alias(&t.symbol);
        Some(
            RawTicker::new(t.symbol, t.best_bid_price, t.best_ask_price)
                .volumes(t.best_bid_size, t.best_ask_size)
                .alias(alias),
        )
    })
}

pub struct KuCoinExchange {
    ctx: ExchangeContext,
}

impl From<ExchangeContext> for KuCoinExchange {
    fn from(ctx: ExchangeContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ExchangeAdapter for KuCoinExchange {
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
    fn test_parse_spot_all_tickers() {
        let data = json!({
            "code": "200000",
            "data": {
                "time": 1700000000000u64,
                "ticker": [
                    {"symbol": "BTC-USDT", "buy": "65000.1", "sell": "65000.3", "bestBidSize": "0.5", "bestAskSize": "0.7"},
                    {"symbol": "NEW-USDT", "buy": null, "sell": null}
                ]
            }
        });
        let quotes = parse_spot("kucoin", data);
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol, "BTC");
        assert_eq!(quotes[0].original_symbol, "BTC-USDT");
        assert_eq!(quotes[0].bid, 65000.1);
        assert_eq!(quotes[0].ask, 65000.3);
        assert_eq!(quotes[0].ask_volume, Some(0.7));
    }

    #[test]
    fn test_parse_futures_contract_symbols() {
        let data = json!({
            "code": "200000",
            "data": [
                {"symbol": "XBTUSDTM", "bestBidPrice": "65020", "bestAskPrice": "65021", "bestBidSize": 12, "bestAskSize": 3},
                {"symbol": "ETHUSDTM", "bestBidPrice": "3001.1", "bestAskPrice": "3001.2"}
            ]
        });
        let quotes = parse_futures("kucoin", data);
        let symbols: Vec<&str> = quotes.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTC", "ETH"]);
        assert_eq!(quotes[0].original_symbol, "XBTUSDTM");
        assert_eq!(quotes[0].market_type, MarketType::Futures);
    }

    #[test]
    fn test_contract_alias() {
        assert_eq!(contract_alias("XBTUSDTM"), "BTCUSDT");
        assert_eq!(contract_alias("SOLUSDTM"), "SOLUSDT");
        assert_eq!(contract_alias("XBTUSDM"), "BTCUSD");
    }
}
