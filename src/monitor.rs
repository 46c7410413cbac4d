use log::{error, info};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time;

use crate::aggregator::PriceAggregator;
use crate::cache::ResultCache;
use crate::config::{Config, ExchangeProfile};
use crate::core::types::{ArbitrageOpportunity, ScanRequest};
use crate::detector::OpportunityDetector;
use crate::error::{Result, ScanError};
use crate::exchanges::{create_adapter, ExchangeAdapter, ExchangeContext};
use crate::fetcher::HttpFetcher;
use crate::progress::ProgressReporter;
use crate::rate_limiter::RateLimiter;

/// 套利扫描的入口：校验请求，驱动行情聚合和机会检测
///
/// 缓存和各交易所的限流器在整个进程内共享；HTTP 客户端每次扫描新建，
/// 扫描结束（成功或失败）时随之释放。
pub struct ArbitrageMonitor {
    config: Config,
    cache: Arc<ResultCache>,
    limiters: HashMap<String, Arc<RateLimiter>>,
    progress: ProgressReporter,
}

impl ArbitrageMonitor {
    pub fn new(config: Config) -> Self {
        let cache = Arc::new(ResultCache::new(&config.cache));
        let limiters = config
            .exchange_configs
            .values()
            .map(|profile| {
                (
                    profile.id.clone(),
                    Arc::new(RateLimiter::new(&profile.id, profile.rate_limit)),
                )
            })
            .collect();

        Self {
            config,
            cache,
            limiters,
            progress: ProgressReporter::silent(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// 使用配置中的默认参数，扫描所有启用的交易所
    pub fn default_request(&self) -> ScanRequest {
        ScanRequest {
            exchanges: self
                .config
                .get_enabled_exchanges()
                .iter()
                .map(|p| p.id.clone())
                .collect(),
            analysis: Default::default(),
            investment: self.config.arbitrage.default_investment,
            min_spread_percent: self.config.arbitrage.min_spread_percent,
            max_spread_percent: self.config.arbitrage.max_spread_percent,
        }
    }

    /// 请求校验，在任何网络请求之前完成；返回本次参与扫描的交易所
    fn validate(&self, request: &ScanRequest) -> Result<Vec<ExchangeProfile>> {
        if !request.investment.is_finite() || request.investment <= 0.0 {
            return Err(ScanError::InvalidRequest(format!(
                "investment must be a positive number, got {}",
                request.investment
            )));
        }

        let (min, max) = (request.min_spread_percent, request.max_spread_percent);
        if !min.is_finite() || !max.is_finite() || min < 0.0 || min > max {
            return Err(ScanError::InvalidRequest(format!(
                "spread bounds must satisfy 0 <= min <= max, got [{}, {}]",
                min, max
            )));
        }

        let mut selected: Vec<ExchangeProfile> = Vec::new();
        for id in &request.exchanges {
            let profile = self
                .config
                .get_exchange_config(id)
                .ok_or_else(|| ScanError::UnknownExchange(id.clone()))?;

            if !profile.enabled {
                info!("{}: disabled in configuration, skipping", profile.id);
                continue;
            }
            if selected.iter().all(|p| p.id != profile.id) {
                selected.push(profile.clone());
            }
        }

        if selected.is_empty() {
            return Err(ScanError::NoActiveExchanges);
        }
        Ok(selected)
    }

    fn build_adapters(
        &self,
        profiles: Vec<ExchangeProfile>,
        fetcher: &Arc<HttpFetcher>,
    ) -> Result<Vec<Box<dyn ExchangeAdapter>>> {
        profiles
            .into_iter()
            .map(|profile| {
                let limiter = self
                    .limiters
                    .get(&profile.id)
                    .cloned()
                    .ok_or_else(|| ScanError::UnknownExchange(profile.id.clone()))?;
                create_adapter(ExchangeContext::new(profile, Arc::clone(fetcher), limiter))
            })
            .collect()
    }

    /// 执行一次完整扫描
    ///
    /// 只有请求校验错误会返回 `Err`；单个交易所的抓取失败只会让它少贡献报价。
    pub async fn find_opportunities(&self, request: &ScanRequest) -> Result<Vec<ArbitrageOpportunity>> {
        let profiles = self.validate(request)?;

        if !request.analysis.any() {
            self.progress.emit("No analysis type selected, nothing to scan");
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let names: Vec<&str> = profiles.iter().map(|p| p.name.as_str()).collect();
        self.progress.emit(format!(
            "Starting scan on {} exchanges: {}",
            profiles.len(),
            names.join(", ")
        ));

        // 本次扫描的连接池，函数返回时随 adapters 一起释放
        let fetcher = Arc::new(HttpFetcher::new(
            &self.config.fetch,
            Arc::clone(&self.cache),
            self.progress.clone(),
        )?);
        let adapters = self.build_adapters(profiles, &fetcher)?;

        let quotes = PriceAggregator::new(self.progress.clone())
            .fetch_all(&adapters, &request.analysis)
            .await;
        let quote_count: usize = quotes.values().map(Vec::len).sum();
        self.progress.emit(format!(
            "Collected {} quotes for {} symbols",
            quote_count,
            quotes.len()
        ));

        let detector = OpportunityDetector::new(self.config.fee_schedules(), request.analysis);
        let opportunities = detector.detect(
            &quotes,
            request.min_spread_percent,
            request.max_spread_percent,
            request.investment,
        );

        self.progress.emit(format!(
            "Scan finished in {:.1}s: found {} opportunities",
            started.elapsed().as_secs_f64(),
            opportunities.len()
        ));
        Ok(opportunities)
    }

    /// 按固定间隔重复扫描，每次结果交给 `sink`；`sink` 返回 false 时停止
    ///
    /// 第一次扫描立即开始。请求校验失败时直接返回错误。
    pub async fn run_periodic<F>(&self, request: &ScanRequest, interval: Duration, mut sink: F) -> Result<()>
    where
        F: FnMut(&[ArbitrageOpportunity]) -> bool,
    {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match self.find_opportunities(request).await {
                Ok(opportunities) => {
                    if !opportunities.is_empty() {
                        info!("发现 {} 个套利机会", opportunities.len());
                    }
                    if !sink(&opportunities) {
                        return Ok(());
                    }
                }
                Err(e) => {
                    error!("扫描套利机会时出错: {}", e);
                    return Err(e);
                }
            }
        }
    }
}
