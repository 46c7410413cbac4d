use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tabled::Tabled;

fn display_price(price: &f64) -> String {
    let formatted = format!("{:.8}", price);
    formatted.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn display_percent(value: &f64) -> String {
    format!("{:.2}%", value)
}

fn display_amount(value: &f64) -> String {
    format!("${:.2}", value)
}

/// 市场类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Spot,
    Futures,
}

impl MarketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketType::Spot => "spot",
            MarketType::Futures => "futures",
        }
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketType::Spot => write!(f, "Spot"),
            MarketType::Futures => write!(f, "Futures"),
        }
    }
}

/// 单个交易所某个交易对的最优买卖价
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    pub exchange: String,
    pub market_type: MarketType,
    /// 归一化后的符号，跨交易所可比
    pub symbol: String,
    pub bid: f64,
    pub ask: f64,
    pub bid_volume: Option<f64>,
    pub ask_volume: Option<f64>,
    /// 交易所原始符号，用于排查
    pub original_symbol: String,
}

impl Quote {
    /// 构造报价；价格非有限值、非正或 bid >= ask 时返回 None
    pub fn new(
        exchange: &str,
        market_type: MarketType,
        symbol: String,
        original_symbol: String,
        bid: f64,
        ask: f64,
    ) -> Option<Self> {
        if !bid.is_finite() || !ask.is_finite() || bid <= 0.0 || ask <= 0.0 || bid >= ask {
            return None;
        }

        Some(Self {
            exchange: exchange.to_string(),
            market_type,
            symbol,
            bid,
            ask,
            bid_volume: None,
            ask_volume: None,
            original_symbol,
        })
    }

    /// 附带挂单量；负数或非有限值会被丢弃
    pub fn with_volumes(mut self, bid_volume: Option<f64>, ask_volume: Option<f64>) -> Self {
        let valid = |v: f64| v.is_finite() && v >= 0.0;
        self.bid_volume = bid_volume.filter(|v| valid(*v));
        self.ask_volume = ask_volume.filter(|v| valid(*v));
        self
    }
}

/// 归一化符号 -> 各交易所报价
///
/// 使用有序 map，保证检测结果在相同输入下顺序确定。
pub type SymbolQuoteSet = BTreeMap<String, Vec<Quote>>;

/// 三种可独立开关的分析类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisTypes {
    pub spot_spot: bool,
    pub spot_futures: bool,
    pub futures_futures: bool,
}

impl Default for AnalysisTypes {
    fn default() -> Self {
        Self {
            spot_spot: true,
            spot_futures: false,
            futures_futures: false,
        }
    }
}

impl AnalysisTypes {
    pub fn needs_spot(&self) -> bool {
        self.spot_spot || self.spot_futures
    }

    pub fn needs_futures(&self) -> bool {
        self.spot_futures || self.futures_futures
    }

    pub fn any(&self) -> bool {
        self.spot_spot || self.spot_futures || self.futures_futures
    }

    /// 买入/卖出市场组合是否在启用的分析类型中，期货买现货卖永远无效
    pub fn allows(&self, buy: MarketType, sell: MarketType) -> bool {
        match (buy, sell) {
            (MarketType::Spot, MarketType::Spot) => self.spot_spot,
            (MarketType::Spot, MarketType::Futures) => self.spot_futures,
            (MarketType::Futures, MarketType::Futures) => self.futures_futures,
            (MarketType::Futures, MarketType::Spot) => false,
        }
    }

    /// 根据启用的分析类型决定需要抓取的市场
    pub fn required_markets(&self) -> Vec<MarketType> {
        let mut markets = Vec::with_capacity(2);
        if self.needs_spot() {
            markets.push(MarketType::Spot);
        }
        if self.needs_futures() {
            markets.push(MarketType::Futures);
        }
        markets
    }
}

/// 一次扫描请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    pub exchanges: Vec<String>,
    pub analysis: AnalysisTypes,
    pub investment: f64,
    pub min_spread_percent: f64,
    pub max_spread_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Tabled)]
pub struct ArbitrageOpportunity {
    #[tabled(rename = "Pair")]
    pub symbol: String,
    #[tabled(rename = "Buy Exchange")]
    pub buy_exchange: String,
    #[tabled(rename = "Buy Market")]
    pub buy_market_type: MarketType,
    #[tabled(rename = "Buy Price", display_with = "display_price")]
    pub buy_price: f64,
    #[tabled(rename = "Sell Exchange")]
    pub sell_exchange: String,
    #[tabled(rename = "Sell Market")]
    pub sell_market_type: MarketType,
    #[tabled(rename = "Sell Price", display_with = "display_price")]
    pub sell_price: f64,
    #[tabled(rename = "Spread %", display_with = "display_percent")]
    pub spread_percent: f64,
    #[tabled(rename = "Profit $", display_with = "display_amount")]
    pub profit_amount: f64,
    #[tabled(rename = "Investment", display_with = "display_amount")]
    pub investment: f64,
    #[tabled(skip)]
    pub buy_fee_percent: f64,
    #[tabled(skip)]
    pub sell_fee_percent: f64,
    #[tabled(skip)]
    pub buy_volume: Option<f64>,
    #[tabled(skip)]
    pub sell_volume: Option<f64>,
    #[tabled(skip)]
    pub timestamp: DateTime<Utc>,
}

impl ArbitrageOpportunity {
    /// 利润占投资额的百分比
    pub fn profit_percentage(&self) -> f64 {
        if self.investment <= 0.0 {
            return 0.0;
        }
        self.profit_amount / self.investment * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_rejects_inverted_and_non_positive_prices() {
        let q = |bid, ask| {
            Quote::new("binance", MarketType::Spot, "BTC".into(), "BTCUSDT".into(), bid, ask)
        };
        assert!(q(100.0, 100.1).is_some());
        assert!(q(100.0, 100.0).is_none());
        assert!(q(101.0, 100.0).is_none());
        assert!(q(0.0, 1.0).is_none());
        assert!(q(-1.0, 1.0).is_none());
        assert!(q(f64::NAN, 1.0).is_none());
    }

    #[test]
    fn test_analysis_types_pair_rules() {
        let all = AnalysisTypes {
            spot_spot: true,
            spot_futures: true,
            futures_futures: true,
        };
        assert!(all.allows(MarketType::Spot, MarketType::Spot));
        assert!(all.allows(MarketType::Spot, MarketType::Futures));
        assert!(all.allows(MarketType::Futures, MarketType::Futures));
        assert!(!all.allows(MarketType::Futures, MarketType::Spot));

        let futures_only = AnalysisTypes {
            spot_spot: false,
            spot_futures: false,
            futures_futures: true,
        };
        assert_eq!(futures_only.required_markets(), vec![MarketType::Futures]);
        assert_eq!(
            AnalysisTypes::default().required_markets(),
            vec![MarketType::Spot]
        );
        assert_eq!(all.required_markets().len(), 2);
    }

    #[test]
    fn test_volumes_are_filtered() {
        let quote = Quote::new("okx", MarketType::Spot, "ETH".into(), "ETH-USDT".into(), 1.0, 2.0)
            .unwrap()
            .with_volumes(Some(-3.0), Some(4.5));
        assert_eq!(quote.bid_volume, None);
        assert_eq!(quote.ask_volume, Some(4.5));
    }
}
