use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::Value;

use crate::config::ExchangeProfile;
use crate::core::types::{MarketType, Quote};
use crate::error::Result;
use crate::exchanges::{array_at, collect_quotes, ExchangeAdapter, ExchangeContext, RawTicker};
use crate::utils::{de_number, de_opt_number};

#[derive(Debug, Deserialize)]
struct Entry {
    symbol: String,
    ticker: Ticker,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker {
    #[serde(deserialize_with = "de_number")]
    bid: f64,
    #[serde(deserialize_with = "de_number")]
    ask: f64,
    #[serde(default, deserialize_with = "de_opt_number")]
    bid_vol: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    ask_vol: Option<f64>,
}

/// 顶层数组，部分版本包在 `data` 中
pub fn parse_spot(exchange: &str, data: Value) -> Vec<Quote> {
    let entries = if data.is_array() {
        array_at(data, "")
    } else {
        array_at(data, "/data")
    };

    collect_quotes(exchange, MarketType::Spot, entries, |e: Entry| {
        Some(RawTicker::new(e.symbol, e.ticker.bid, e.ticker.ask).volumes(e.ticker.bid_vol, e.ticker.ask_vol))
    })
}

/// 只有现货行情
pub struct LBankExchange {
    ctx: ExchangeContext,
}

impl From<ExchangeContext> for LBankExchange {
    fn from(ctx: ExchangeContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ExchangeAdapter for LBankExchange {
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
