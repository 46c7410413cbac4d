use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::ExchangeProfile;
use crate::core::types::{MarketType, Quote};
use crate::error::Result;
use crate::exchanges::{array_at, collect_quotes, ExchangeAdapter, ExchangeContext, RawTicker};
use crate::utils::{de_number, de_opt_number};

/// 现货 24hr 和永续 ticker 都在 `data` 数组中，符号形如 `BTC-USDT`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker {
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

pub fn parse_tickers(exchange: &str, market_type: MarketType, data: Value) -> Vec<Quote> {
    collect_quotes(exchange, market_type, array_at(data, "/data"), |t: Ticker| {
        Some(RawTicker::new(t.symbol, t.bid_price, t.ask_price).volumes(t.bid_qty, t.ask_qty))
    })
}

pub struct BingXExchange {
    ctx: ExchangeContext,
}

impl From<ExchangeContext> for BingXExchange {
    fn from(ctx: ExchangeContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ExchangeAdapter for BingXExchange {
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
