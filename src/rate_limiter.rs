//! 每个交易所独立的并发 + 节奏限制

use log::{debug, warn};
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tokio::time::{sleep, Instant};

/// 同时限制在途请求数和相邻请求的最小间隔（`1 / rate` 秒）
///
/// 间隔基于限流器自己最后一次放行的时间，而不是调用方，
/// 因此一批并发调用会依次排到节奏表上，而不是同时醒来。
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    spacing: Duration,
    slots: Semaphore,
    last_call: Mutex<Option<Instant>>,
}

/// 持有期间占用一个并发槽，drop 时归还
#[derive(Debug)]
pub struct RatePermit<'a> {
    _slot: Option<SemaphorePermit<'a>>,
}

impl RateLimiter {
    /// `rate` 为每秒请求预算，并发槽数取 `ceil(rate)`，范围 `[1, Semaphore::MAX_PERMITS]`
    pub fn new(name: &str, rate: f64) -> Self {
        let max_concurrent = if rate.is_finite() && rate >= 1.0 {
            // `as` 在 f64 -> usize 时饱和
            rate.ceil() as usize
        } else {
            1
        };
        Self::with_concurrency(name, rate, max_concurrent)
    }

    /// 间隔无法表示为 `Duration` 的极小速率按不限速处理
    pub fn with_concurrency(name: &str, rate: f64, max_concurrent: usize) -> Self {
        let spacing = if rate.is_finite() && rate > 0.0 {
            Duration::try_from_secs_f64(1.0 / rate).unwrap_or_else(|_| {
                warn!("{}: rate {} is out of range, pacing disabled", name, rate);
                Duration::ZERO
            })
        } else {
            Duration::ZERO
        };

        Self {
            name: name.to_string(),
            spacing,
            slots: Semaphore::new(max_concurrent.clamp(1, Semaphore::MAX_PERMITS)),
            last_call: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// 等待一个并发槽以及节奏窗口；只会延迟，不会失败
    pub async fn acquire(&self) -> RatePermit<'_> {
        // 信号量从不关闭，这里的错误分支只是为了不 panic
        let slot = self.slots.acquire().await.ok();

        let mut last_call = self.last_call.lock().await;
        if let Some(last) = *last_call {
            let elapsed = last.elapsed();
            if elapsed < self.spacing {
                let wait = self.spacing - elapsed;
                debug!("{}: rate limiting - waiting {:.3}s", self.name, wait.as_secs_f64());
                sleep(wait).await;
            }
        }
        *last_call = Some(Instant::now());

        RatePermit { _slot: slot }
    }

    /// 显式归还并发槽，等价于 drop 许可
    pub fn release(&self, permit: RatePermit<'_>) {
        drop(permit);
    }

    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }
}
