//! 带缓存、限流和重试的 HTTP 抓取

use log::{debug, error};
use reqwest::Client;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::ResultCache;
use crate::config::FetchConfig;
use crate::error::{Result, ScanError};
use crate::progress::ProgressReporter;
use crate::rate_limiter::RateLimiter;

/// 线性退避的重试策略：第 n 次失败后等待 `delay * n`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(config.max_retries, Duration::from_millis(config.retry_delay_ms))
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        self.delay * attempt
    }

    /// 执行 `operation`，失败时按策略重试，最后一次失败的错误原样返回
    ///
    /// 只有 [`ScanError::is_transient`] 的错误会被重试。
    pub async fn run<T, F, Fut>(
        &self,
        label: &str,
        progress: &ProgressReporter,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let wait = self.backoff(attempt);
                    let message = format!(
                        "{}: attempt {}/{} failed. Retrying in {:.1}s. Error: {}",
                        label,
                        attempt,
                        self.max_attempts,
                        wait.as_secs_f64(),
                        e
                    );
                    progress.warn(message);
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

/// 所有交易所共用的抓取器；HTTP 连接池在 drop 时释放
pub struct HttpFetcher {
    client: Client,
    cache: Arc<ResultCache>,
    policy: RetryPolicy,
    progress: ProgressReporter,
}

impl HttpFetcher {
    pub fn new(
        config: &FetchConfig,
        cache: Arc<ResultCache>,
        progress: ProgressReporter,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ScanError::from_reqwest("http-client", e))?;

        Ok(Self {
            client,
            cache,
            policy: RetryPolicy::from_config(config),
            progress,
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    pub fn cache_key(exchange: &str, url: &str, params: &[(&str, &str)]) -> String {
        format!("{}_{}_{:?}", exchange, url, params)
    }

    /// 缓存查找 -> 限流 -> GET -> 状态码校验 -> JSON 解码 -> 写缓存
    pub async fn fetch(
        &self,
        exchange: &str,
        limiter: &RateLimiter,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<Value> {
        let cache_key = Self::cache_key(exchange, url, params);
        let key = cache_key.as_str();

        let label = format!("{} {}", exchange, url);
        let result = self
            .policy
            .run(&label, &self.progress, || async move {
                if let Some(cached) = self.cache.get(key).await {
                    debug!("Using cached data for {}", exchange);
                    return Ok(cached);
                }

                let data = self.get_json(exchange, limiter, url, params).await?;
                self.cache.set(key, data.clone()).await;
                Ok(data)
            })
            .await;

        if let Err(e) = &result {
            error!("{}: giving up after {} attempts: {}", exchange, self.policy.max_attempts, e);
        }
        result
    }

    async fn get_json(
        &self,
        exchange: &str,
        limiter: &RateLimiter,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<Value> {
        let _permit = limiter.acquire().await;

        let mut request = self.client.get(url);
        if !params.is_empty() {
            request = request.query(params);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ScanError::from_reqwest(exchange, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::HttpStatus {
                exchange: exchange.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ScanError::from_reqwest(exchange, e))?;

        serde_json::from_slice(&body).map_err(|source| ScanError::Decode {
            exchange: exchange.to_string(),
            source,
        })
    }
}
