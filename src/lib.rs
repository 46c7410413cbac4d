//! Arbitrage Scanner - 中心化交易所价差套利扫描
//!
//! 并发抓取多个交易所的现货/期货最优买卖价，统一符号后按交易对合并，
//! 计入手续费后找出跨交易所的价差套利机会。

pub mod aggregator;
pub mod cache;
pub mod cli;
pub mod config;
pub mod core;
pub mod detector;
pub mod error;
pub mod exchanges;
pub mod fetcher;
pub mod monitor;
pub mod progress;
pub mod rate_limiter;
pub mod utils;

// 重新导出常用类型
pub use aggregator::PriceAggregator;
pub use config::Config;
pub use crate::core::types::{AnalysisTypes, ArbitrageOpportunity, MarketType, Quote, ScanRequest, SymbolQuoteSet};
pub use detector::OpportunityDetector;
pub use error::{Result, ScanError};
pub use monitor::ArbitrageMonitor;
pub use progress::ProgressReporter;
