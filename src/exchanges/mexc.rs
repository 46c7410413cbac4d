use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::ExchangeProfile;
use crate::core::types::{MarketType, Quote};
use crate::error::Result;
use crate::exchanges::binance::BookTicker;
use crate::exchanges::{array_at, collect_quotes, ExchangeAdapter, ExchangeContext, RawTicker};
use crate::utils::{de_number, de_opt_number};

/// 合约行情 `data` 数组，价格为数字，符号形如 `BTC_USDT`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContractTicker {
    symbol: String,
    #[serde(deserialize_with = "de_number")]
    bid1: f64,
    #[serde(deserialize_with = "de_number")]
    ask1: f64,
    #[serde(default, deserialize_with = "de_opt_number")]
    bid1_vol: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    ask1_vol: Option<f64>,
}

/// 现货接口与 Binance bookTicker 格式相同
pub fn parse_spot(exchange: &str, data: Value) -> Vec<Quote> {
    collect_quotes(exchange, MarketType::Spot, array_at(data, ""), BookTicker::into_raw)
}

pub fn parse_futures(exchange: &str, data: Value) -> Vec<Quote> {
    collect_quotes(exchange, MarketType::Futures, array_at(data, "/data"), |t: ContractTicker| {
        Some(RawTicker::new(t.symbol, t.bid1, t.ask1).volumes(t.bid1_vol, t.ask1_vol))
    })
}

pub struct MexcExchange {
    ctx: ExchangeContext,
}

impl From<ExchangeContext> for MexcExchange {
    fn from(ctx: ExchangeContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ExchangeAdapter for MexcExchange {
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
    fn test_parse_spot_book_ticker() {
        let data = json!([
            {"symbol": "SOLUSDT", "bidPrice": "150.01", "bidQty": "10", "askPrice": "150.05", "askQty": "12"},
            {"symbol": "SOLUSDC", "bidPrice": "150.00", "askPrice": "150.10"}
        ]);
        let quotes = parse_spot("mexc", data);
        // 两个计价币归一化到同一符号，保留后出现的一条
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].original_symbol, "SOLUSDC");
        assert_eq!(quotes[0].ask, 150.10);
    }

    #[test]
    fn test_parse_contract_tickers() {
        let data = json!({
            "success": true,
            "code": 0,
            "data": [
                {"symbol": "BTC_USDT", "lastPrice": 65001.0, "bid1": 65000.5, "ask1": 65001.5, "volume24": 123456},
                {"symbol": "ETH_USDT", "bid1": 3000.0, "ask1": 3000.0}
            ]
        });
        let quotes = parse_futures("mexc", data);
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol, "BTC");
        assert_eq!(quotes[0].bid, 65000.5);
        assert_eq!(quotes[0].bid_volume, None);
    }
}
