use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::ExchangeProfile;
use crate::core::types::{MarketType, Quote};
use crate::error::Result;
use crate::exchanges::{array_at, collect_quotes, ExchangeAdapter, ExchangeContext, RawTicker};
use crate::utils::{de_number, de_opt_number};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpotTicker {
    symbol: String,
    #[serde(rename = "buyOne", deserialize_with = "de_number")]
    bid: f64,
    #[serde(rename = "sellOne", deserialize_with = "de_number")]
    ask: f64,
    #[serde(default, deserialize_with = "de_opt_number")]
    bid_sz: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    ask_sz: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MixTicker {
    symbol: String,
    #[serde(deserialize_with = "de_number")]
    best_bid: f64,
    #[serde(deserialize_with = "de_number")]
    best_ask: f64,
    #[serde(default, deserialize_with = "de_opt_number")]
    bid_sz: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    ask_sz: Option<f64>,
}

/// 去掉产品线后缀，例如 `BTCUSDT_UMCBL` -> `BTCUSDT`
fn product_alias(symbol: &str) -> &str {
    symbol.split('_').next().unwrap_or(symbol)
}

pub fn parse_spot(exchange: &str, data: Value) -> Vec<Quote> {
    collect_quotes(exchange, MarketType::Spot, array_at(data, "/data"), |t: SpotTicker| {
        let alias = product_alias(&t.symbol).to_string();
        Some(
            RawTicker::new(t.symbol, t.bid, t.ask)
                .volumes(t.bid_sz, t.ask_sz)
                .alias(alias),
        )
    })
}

pub fn parse_futures(exchange: &str, data: Value) -> Vec<Quote> {
    collect_quotes(exchange, MarketType::Futures, array_at(data, "/data"), |t: MixTicker| {
        let alias = product_alias(&t.symbol).to_string();
        Some(
            RawTicker::new(t.symbol, t.best_bid, t.best_ask)
                .volumes(t.bid_sz, t.ask_sz)
                .alias(alias),
        )
    })
}

pub struct BitgetExchange {
    ctx: ExchangeContext,
}

impl From<ExchangeContext> for BitgetExchange {
    fn from(ctx: ExchangeContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ExchangeAdapter for BitgetExchange {
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
