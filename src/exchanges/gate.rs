use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::ExchangeProfile;
use crate::core::types::{MarketType, Quote};
use crate::error::Result;
use crate::exchanges::{array_at, collect_quotes, ExchangeAdapter, ExchangeContext, RawTicker};
use crate::utils::{de_number, de_opt_number};

#[derive(Debug, Deserialize)]
struct SpotTicker {
    currency_pair: String,
    #[serde(deserialize_with = "de_number")]
    highest_bid: f64,
    #[serde(deserialize_with = "de_number")]
    lowest_ask: f64,
}

/// USDT 永续合约；旧版字段名是 `bid1_price` / `ask1_price`
#[derive(Debug, Deserialize)]
struct ContractTicker {
    contract: String,
    #[serde(alias = "bid1_price", deserialize_with = "de_number")]
    highest_bid: f64,
    #[serde(alias = "ask1_price", deserialize_with = "de_number")]
    lowest_ask: f64,
    #[serde(default, deserialize_with = "de_opt_number")]
    bid1_size: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    ask1_size: Option<f64>,
}

pub fn parse_spot(exchange: &str, data: Value) -> Vec<Quote> {
    collect_quotes(exchange, MarketType::Spot, array_at(data, ""), |t: SpotTicker| {
        Some(RawTicker::new(t.currency_pair, t.highest_bid, t.lowest_ask))
    })
}

pub fn parse_futures(exchange: &str, data: Value) -> Vec<Quote> {
    collect_quotes(exchange, MarketType::Futures, array_at(data, ""), |t: ContractTicker| {
        Some(RawTicker::new(t.contract, t.highest_bid, t.lowest_ask).volumes(t.bid1_size, t.ask1_size))
    })
}

pub struct GateExchange {
    ctx: ExchangeContext,
}

impl From<ExchangeContext> for GateExchange {
    fn from(ctx: ExchangeContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ExchangeAdapter for GateExchange {
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
    fn test_parse_spot_tickers() {
        let data = json!([
            {"currency_pair": "BTC_USDT", "last": "65000", "highest_bid": "64999.8", "lowest_ask": "65000.2"},
            {"currency_pair": "ILLIQ_USDT", "last": "1", "highest_bid": "", "lowest_ask": ""}
        ]);
        let quotes = parse_spot("gate", data);
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol, "BTC");
        assert_eq!(quotes[0].original_symbol, "BTC_USDT");
        assert_eq!(quotes[0].bid_volume, None);
    }

    #[test]
    fn test_parse_contract_tickers_with_either_field_name() {
        let data = json!([
            {"contract": "BTC_USDT", "highest_bid": "65010", "lowest_ask": "65010.1", "bid1_size": 100, "ask1_size": 50},
            {"contract": "ETH_USDT", "bid1_price": "3000.5", "ask1_price": "3000.6"}
        ]);
        let quotes = parse_futures("gate", data);
        let symbols: Vec<&str> = quotes.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTC", "ETH"]);
        assert_eq!(quotes[0].bid_volume, Some(100.0));
        assert_eq!(quotes[1].bid, 3000.5);
    }
}
