pub mod binance;
pub mod bingx;
pub mod bitget;
pub mod bybit;
pub mod coinw;
pub mod gate;
pub mod htx;
pub mod kucoin;
pub mod lbank;
pub mod mexc;
pub mod okx;

use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{exchange_ids, ExchangeProfile};
use crate::core::types::{MarketType, Quote};
use crate::error::{Result, ScanError};
use crate::fetcher::HttpFetcher;
use crate::rate_limiter::RateLimiter;
use crate::utils::normalize_symbol;

#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// 交易所标识
    fn id(&self) -> &str;

    fn profile(&self) -> &ExchangeProfile;

    /// 现货最优买卖价
    async fn get_spot_prices(&self) -> Result<Vec<Quote>>;

    /// 期货最优买卖价；不支持期货的交易所返回空列表
    async fn get_futures_prices(&self) -> Result<Vec<Quote>>;

    async fn get_prices(&self, market_type: MarketType) -> Result<Vec<Quote>> {
        match market_type {
            MarketType::Spot => self.get_spot_prices().await,
            MarketType::Futures => self.get_futures_prices().await,
        }
    }
}

/// 适配器共用的依赖：交易所配置、抓取器和该交易所的限流器
#[derive(Clone)]
pub struct ExchangeContext {
    pub profile: ExchangeProfile,
    pub fetcher: Arc<HttpFetcher>,
    pub limiter: Arc<RateLimiter>,
}

impl ExchangeContext {
    pub fn new(profile: ExchangeProfile, fetcher: Arc<HttpFetcher>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            profile,
            fetcher,
            limiter,
        }
    }

    pub fn id(&self) -> &str {
        &self.profile.id
    }

    pub async fn fetch(&self, url: &str) -> Result<Value> {
        self.fetcher
            .fetch(&self.profile.id, &self.limiter, url, &[])
            .await
    }

    pub async fn fetch_spot(&self) -> Result<Value> {
        self.fetch(&self.profile.spot_url).await
    }

    /// 未配置期货地址时返回 None
    pub async fn fetch_futures(&self) -> Result<Option<Value>> {
        match &self.profile.futures_url {
            Some(url) => self.fetch(url).await.map(Some),
            None => Ok(None),
        }
    }
}

/// 从单条行情中提取出的原始字段
#[derive(Debug, Clone, PartialEq)]
pub struct RawTicker {
    /// 交易所原始符号
    pub symbol: String,
    /// 参与归一化的符号，交易所符号带有特殊后缀或别名时使用
    pub alias: Option<String>,
    pub bid: f64,
    pub ask: f64,
    pub bid_volume: Option<f64>,
    pub ask_volume: Option<f64>,
}

impl RawTicker {
    pub fn new(symbol: String, bid: f64, ask: f64) -> Self {
        Self {
            symbol,
            alias: None,
            bid,
            ask,
            bid_volume: None,
            ask_volume: None,
        }
    }

    pub fn volumes(mut self, bid_volume: Option<f64>, ask_volume: Option<f64>) -> Self {
        self.bid_volume = bid_volume;
        self.ask_volume = ask_volume;
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// 把一组原始行情转换为归一化报价
///
/// 单条记录字段缺失、价格无法解析、非正或 bid >= ask 时静默跳过。
/// 同一归一化符号出现多次时保留最后一条。
pub fn collect_quotes<T, F>(
    exchange: &str,
    market_type: MarketType,
    entries: Vec<Value>,
    extract: F,
) -> Vec<Quote>
where
    T: DeserializeOwned,
    F: Fn(T) -> Option<RawTicker>,
{
    let total = entries.len();
    let mut quotes: Vec<Quote> = Vec::with_capacity(total);
    let mut index: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        let ticker: T = match serde_json::from_value(entry) {
            Ok(ticker) => ticker,
            Err(_) => continue,
        };
        let raw = match extract(ticker) {
            Some(raw) => raw,
            None => continue,
        };
        let symbol = normalize_symbol(raw.alias.as_deref().unwrap_or(&raw.symbol), market_type);
        if symbol.is_empty() {
            continue;
        }

        let quote = match Quote::new(exchange, market_type, symbol, raw.symbol, raw.bid, raw.ask) {
            Some(quote) => quote.with_volumes(raw.bid_volume, raw.ask_volume),
            None => continue,
        };

        match index.get(&quote.symbol) {
            Some(&i) => quotes[i] = quote,
            None => {
                index.insert(quote.symbol.clone(), quotes.len());
                quotes.push(quote);
            }
        }
    }

    debug!(
        "{} {}: {} valid quotes out of {} tickers",
        exchange,
        market_type.as_str(),
        quotes.len(),
        total
    );
    quotes
}

/// 取出信封中的数组；形状不符时视为没有数据，空指针表示顶层数组
pub fn array_at(data: Value, pointer: &str) -> Vec<Value> {
    let target = if pointer.is_empty() {
        Some(data)
    } else {
        data.pointer(pointer).cloned()
    };

    match target {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

pub type AdapterConstructor = fn(ExchangeContext) -> Box<dyn ExchangeAdapter>;

fn boxed<A>(ctx: ExchangeContext) -> Box<dyn ExchangeAdapter>
where
    A: ExchangeAdapter + From<ExchangeContext> + 'static,
{
    Box::new(A::from(ctx))
}

/// 交易所标识 -> 适配器构造函数
static REGISTRY: [(&str, AdapterConstructor); 11] = [
    (exchange_ids::BINANCE, boxed::<binance::BinanceExchange>),
    (exchange_ids::BYBIT, boxed::<bybit::BybitExchange>),
    (exchange_ids::KUCOIN, boxed::<kucoin::KuCoinExchange>),
    (exchange_ids::MEXC, boxed::<mexc::MexcExchange>),
    (exchange_ids::OKX, boxed::<okx::OkxExchange>),
    (exchange_ids::HTX, boxed::<htx::HtxExchange>),
    (exchange_ids::BITGET, boxed::<bitget::BitgetExchange>),
    (exchange_ids::BINGX, boxed::<bingx::BingXExchange>),
    (exchange_ids::GATE, boxed::<gate::GateExchange>),
    (exchange_ids::LBANK, boxed::<lbank::LBankExchange>),
    (exchange_ids::COINW, boxed::<coinw::CoinWExchange>),
];

pub fn registry() -> &'static [(&'static str, AdapterConstructor)] {
    &REGISTRY
}

pub fn supported_exchanges() -> Vec<&'static str> {
    registry().iter().map(|(id, _)| *id).collect()
}

pub fn is_supported(exchange_id: &str) -> bool {
    let id = exchange_id.to_lowercase();
    registry().iter().any(|(known, _)| *known == id)
}

/// 根据配置中的标识创建适配器
pub fn create_adapter(ctx: ExchangeContext) -> Result<Box<dyn ExchangeAdapter>> {
    let id = ctx.id().to_lowercase();
    let constructor = registry()
        .iter()
        .find(|(known, _)| *known == id)
        .map(|(_, constructor)| *constructor)
        .ok_or_else(|| ScanError::UnknownExchange(id.clone()))?;
    Ok(constructor(ctx))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::cache::ResultCache;
    use crate::config::{Config, FetchConfig};
    use crate::fetcher::RetryPolicy;
    use crate::progress::ProgressReporter;
    use std::time::Duration;

    /// 指向给定地址的测试上下文，关闭缓存、快速重试
    pub fn context(id: &str, spot_url: &str, futures_url: Option<&str>) -> ExchangeContext {
        let mut profile = Config::default()
            .get_exchange_config(id)
            .cloned()
            .unwrap_or_else(|| panic!("unknown exchange {}", id));
        profile.spot_url = spot_url.to_string();
        profile.futures_url = futures_url.map(str::to_string);

        let cache = Arc::new(ResultCache::with_ttl(false, Duration::from_secs(1)));
        let fetcher = HttpFetcher::new(&FetchConfig::default(), cache, ProgressReporter::silent())
            .unwrap()
            .with_policy(RetryPolicy::new(1, Duration::from_millis(1)));
        let limiter = Arc::new(RateLimiter::new(id, 1000.0));
        ExchangeContext::new(profile, Arc::new(fetcher), limiter)
    }
}
