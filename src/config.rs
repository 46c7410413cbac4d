use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::types::MarketType;
use crate::error::{Result, ScanError};

/// 环境变量前缀，例如 `ARBSCAN__FETCH__MAX_RETRIES=5`
pub const ENV_PREFIX: &str = "ARBSCAN";

// 交易所标识常量
pub mod exchange_ids {
    pub const BINANCE: &str = "binance";
    pub const BYBIT: &str = "bybit";
    pub const KUCOIN: &str = "kucoin";
    pub const MEXC: &str = "mexc";
    pub const OKX: &str = "okx";
    pub const HTX: &str = "htx";
    pub const BITGET: &str = "bitget";
    pub const BINGX: &str = "bingx";
    pub const GATE: &str = "gate";
    pub const LBANK: &str = "lbank";
    pub const COINW: &str = "coinw";

    /// 默认配置表中的顺序
    pub const ALL: [&str; 11] = [
        BINANCE, BYBIT, KUCOIN, MEXC, OKX, HTX, BITGET, BINGX, GATE, LBANK, COINW,
    ];
}

/// 配置中允许的每秒请求预算范围
pub const RATE_LIMIT_RANGE: std::ops::RangeInclusive<f64> = 0.001..=10_000.0;

/// 手续费（百分比）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FeeSchedule {
    pub spot: f64,
    pub futures: f64,
}

impl FeeSchedule {
    pub fn for_market(&self, market_type: MarketType) -> f64 {
        match market_type {
            MarketType::Spot => self.spot,
            MarketType::Futures => self.futures,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeProfile {
    pub id: String,
    pub name: String,
    pub spot_url: String,
    /// 为 None 表示该交易所不支持期货
    pub futures_url: Option<String>,
    pub fee: FeeSchedule,
    /// 每秒请求预算
    pub rate_limit: f64,
    pub enabled: bool,
}

impl ExchangeProfile {
    pub fn supports_futures(&self) -> bool {
        self.futures_url.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// 单次 HTTP 请求的总超时
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    /// 线性退避的基础间隔，第 n 次失败后等待 `retry_delay_ms * n`
    pub retry_delay_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 300, // 5 分钟
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbitrageConfig {
    pub min_spread_percent: f64,
    pub max_spread_percent: f64,
    pub default_investment: f64,
}

impl Default for ArbitrageConfig {
    fn default() -> Self {
        Self {
            min_spread_percent: 0.5,
            max_spread_percent: 10.0,
            default_investment: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub exchange_configs: HashMap<String, ExchangeProfile>,
    pub fetch: FetchConfig,
    pub cache: CacheConfig,
    pub arbitrage: ArbitrageConfig,
}

/// 配置文件 / 环境变量中可覆盖的部分
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Overrides {
    fetch: FetchConfig,
    cache: CacheConfig,
    arbitrage: ArbitrageConfig,
    exchanges: HashMap<String, ExchangeOverride>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExchangeOverride {
    enabled: Option<bool>,
    rate_limit: Option<f64>,
    spot_url: Option<String>,
    futures_url: Option<String>,
}

fn profile(
    id: &str,
    name: &str,
    spot_url: &str,
    futures_url: Option<&str>,
    spot_fee: f64,
    futures_fee: f64,
    rate_limit: f64,
) -> ExchangeProfile {
    ExchangeProfile {
        id: id.to_string(),
        name: name.to_string(),
        spot_url: spot_url.to_string(),
        futures_url: futures_url.map(str::to_string),
        fee: FeeSchedule {
            spot: spot_fee,
            futures: futures_fee,
        },
        rate_limit,
        enabled: true,
    }
}

fn default_profiles() -> Vec<ExchangeProfile> {
    use exchange_ids::*;

    vec![
        profile(
            BINANCE,
            "Binance",
            "https://api.binance.com/api/v3/ticker/bookTicker",
            Some("https://fapi.binance.com/fapi/v1/ticker/bookTicker"),
            0.075,
            0.04,
            10.0,
        ),
        profile(
            BYBIT,
            "Bybit",
            "https://api.bybit.com/v5/market/tickers?category=spot",
            Some("https://api.bybit.com/v5/market/tickers?category=linear"),
            0.06,
            0.06,
            5.0,
        ),
        profile(
            KUCOIN,
            "KuCoin",
            "https://api.kucoin.com/api/v1/market/allTickers",
            Some("https://api-futures.kucoin.com/api/v1/allTickers"),
            0.08,
            0.06,
            5.0,
        ),
        profile(
            MEXC,
            "MEXC",
            "https://api.mexc.com/api/v3/ticker/bookTicker",
            Some("https://contract.mexc.com/api/v1/contract/ticker"),
            0.2,
            0.06,
            5.0,
        ),
        profile(
            OKX,
            "OKX",
            "https://www.okx.com/api/v5/market/tickers?instType=SPOT",
            Some("https://www.okx.com/api/v5/market/tickers?instType=FUTURES"),
            0.08,
            0.05,
            5.0,
        ),
        profile(
            HTX,
            "HTX",
            "https://api.huobi.pro/market/tickers",
            Some("https://api.hbdm.com/linear-swap-ex/market/detail/batch_merged"),
            0.2,
            0.05,
            5.0,
        ),
        profile(
            BITGET,
            "Bitget",
            "https://api.bitget.com/api/spot/v1/market/tickers",
            Some("https://api.bitget.com/api/mix/v1/market/tickers?productType=UMCBL"),
            0.1,
            0.06,
            5.0,
        ),
        profile(
            BINGX,
            "BingX",
            "https://open-api.bingx.com/openApi/spot/v1/ticker/24hr",
            Some("https://open-api.bingx.com/openApi/swap/v2/quote/ticker"),
            0.04,
            0.04,
            5.0,
        ),
        profile(
            GATE,
            "Gate",
            "https://api.gateio.ws/api/v4/spot/tickers",
            Some("https://api.gateio.ws/api/v4/futures/usdt/tickers"),
            0.2,
            0.05,
            5.0,
        ),
        profile(
            LBANK,
            "LBank",
            "https://api.lbkex.com/v1/ticker.do?symbol=all",
            None,
            0.08,
            0.08,
            5.0,
        ),
        profile(
            COINW,
            "CoinW",
            "https://api.coinw.com/api/v1/public?command=returnTicker",
            None,
            0.2,
            0.2,
            5.0,
        ),
    ]
}

impl Default for Config {
    fn default() -> Self {
        let exchange_configs = default_profiles()
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        Self {
            exchange_configs,
            fetch: FetchConfig::default(),
            cache: CacheConfig::default(),
            arbitrage: ArbitrageConfig::default(),
        }
    }
}

impl Config {
    /// 在内置默认值之上叠加可选配置文件和 `ARBSCAN__` 环境变量
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let overrides: Overrides = builder.build()?.try_deserialize()?;

        let mut config = Config::default();
        config.apply(overrides)?;
        Ok(config)
    }

    fn apply(&mut self, overrides: Overrides) -> Result<()> {
        self.fetch = overrides.fetch;
        self.cache = overrides.cache;
        self.arbitrage = overrides.arbitrage;

        for (id, patch) in overrides.exchanges {
            let profile = self
                .exchange_configs
                .get_mut(&id.to_lowercase())
                .ok_or_else(|| ScanError::UnknownExchange(id.clone()))?;

            if let Some(enabled) = patch.enabled {
                profile.enabled = enabled;
            }
            if let Some(rate_limit) = patch.rate_limit {
                if !RATE_LIMIT_RANGE.contains(&rate_limit) {
                    return Err(ScanError::Config(config::ConfigError::Message(format!(
                        "exchanges.{}.rate_limit must be within [{}, {}], got {}",
                        profile.id,
                        RATE_LIMIT_RANGE.start(),
                        RATE_LIMIT_RANGE.end(),
                        rate_limit
                    ))));
                }
                profile.rate_limit = rate_limit;
            }
            if let Some(spot_url) = patch.spot_url {
                profile.spot_url = spot_url;
            }
            if let Some(futures_url) = patch.futures_url {
                profile.futures_url = Some(futures_url);
            }
        }

        Ok(())
    }

    pub fn get_exchange_config(&self, exchange_id: &str) -> Option<&ExchangeProfile> {
        self.exchange_configs.get(&exchange_id.to_lowercase())
    }

    /// 启用的交易所，按默认表顺序，表外的按名称排在后面
    pub fn get_enabled_exchanges(&self) -> Vec<&ExchangeProfile> {
        let mut enabled: Vec<&ExchangeProfile> = self
            .exchange_configs
            .values()
            .filter(|config| config.enabled)
            .collect();

        enabled.sort_by_key(|p| {
            let rank = exchange_ids::ALL
                .iter()
                .position(|id| *id == p.id)
                .unwrap_or(exchange_ids::ALL.len());
            (rank, p.id.clone())
        });
        enabled
    }

    pub fn fee_schedules(&self) -> HashMap<String, FeeSchedule> {
        self.exchange_configs
            .iter()
            .map(|(id, p)| (id.clone(), p.fee))
            .collect()
    }
}
