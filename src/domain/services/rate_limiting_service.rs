// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use dashmap::DashMap;
use metrics::counter;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::settings::{HourlyWindow, RateLimitingSettings};
use crate::utils::errors::LeadError;
use crate::utils::retry_policy::{jittered_delay, BackoffPolicy};

/// 每小时窗口长度
const HOUR: Duration = Duration::from_secs(3600);

/// 单个域名的限流状态
///
/// 只由 [`DomainRateLimiter`] 和它发出的 [`RequestPermit`] 修改
#[derive(Debug, Default)]
pub struct RateLimiterState {
    last_request: Option<Instant>,
    consecutive_errors: u32,
    backoff_multiplier: u32,
    /// 滑动窗口内每次放行的时间
    permits: VecDeque<Instant>,
    /// 固定窗口起点与计数
    window_start: Option<Instant>,
    window_count: u32,
    /// 最近的响应时间样本
    latencies: VecDeque<Duration>,
}

impl RateLimiterState {
    fn new() -> Self {
        Self {
            backoff_multiplier: 1,
            ..Default::default()
        }
    }
}

/// 限流统计信息
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimiterStats {
    pub requests_in_window: u32,
    pub consecutive_errors: u32,
    pub backoff_multiplier: u32,
    pub latency_multiplier: f64,
}

/// 请求许可
///
/// 持有域名状态锁，在许可被释放之前同一域名的其他 `acquire` 调用都会等待。
/// 用 [`RequestPermit::success`] 或 [`RequestPermit::failure`] 报告结果；
/// 直接丢弃许可视为中性结果，不影响退避状态。
pub struct RequestPermit {
    domain: String,
    state: OwnedMutexGuard<RateLimiterState>,
    backoff: BackoffPolicy,
    latency_history: usize,
    waited: Duration,
}

impl RequestPermit {
    /// 获得许可前等待的时间
    pub fn waited(&self) -> Duration {
        self.waited
    }

    /// 报告请求成功
    ///
    /// 重置连续错误计数和退避倍数，并记录响应时间
    pub fn success(mut self, latency: Duration) {
        self.state.consecutive_errors = 0;
        self.state.backoff_multiplier = 1;
        self.state.latencies.push_back(latency);
        while self.state.latencies.len() > self.latency_history {
            self.state.latencies.pop_front();
        }
    }

    /// 报告请求失败
    ///
    /// 超时、连接错误、5xx 和 429 会使退避倍数翻倍；其他错误不改变退避状态
    pub fn failure(mut self, error: &LeadError) {
        if !error.triggers_backoff() {
            return;
        }
        self.state.consecutive_errors = self.state.consecutive_errors.saturating_add(1);
        self.state.backoff_multiplier = self.backoff.multiplier(self.state.consecutive_errors);
        counter!("rate_limit_backoff_total").increment(1);
        warn!(
            domain = %self.domain,
            consecutive_errors = self.state.consecutive_errors,
            multiplier = self.state.backoff_multiplier,
            "Request failed, backing off"
        );
    }
}

/// 域名级速率限制器
///
/// 每个域名一个状态槽位，互不干扰；同一域名的请求严格串行。
pub struct DomainRateLimiter {
    settings: RateLimitingSettings,
    backoff: BackoffPolicy,
    states: DashMap<String, Arc<Mutex<RateLimiterState>>>,
}

impl DomainRateLimiter {
    /// 创建新的速率限制器
    pub fn new(settings: RateLimitingSettings) -> Self {
        Self {
            backoff: BackoffPolicy::from_settings(&settings),
            settings,
            states: DashMap::new(),
        }
    }

    /// 获取请求许可
    ///
    /// 挂起调用方直到满足最小间隔、退避和每小时上限
    ///
    /// # 参数
    ///
    /// * `domain` - 归一化后的域名
    /// * `crawl_delay` - robots 指定的抓取间隔，大于下限时覆盖下限
    ///
    /// # 返回值
    ///
    /// * `Ok(RequestPermit)` - 可以发起请求
    /// * `Err(LeadError::RateLimitExceeded)` - 每小时上限已耗尽且无法在等待上限内恢复
    pub async fn acquire(
        &self,
        domain: &str,
        crawl_delay: Option<Duration>,
    ) -> Result<RequestPermit, LeadError> {
        let slot = self
            .states
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(RateLimiterState::new())))
            .value()
            .clone();

        let started = Instant::now();
        let mut state = slot.lock_owned().await;

        if let Some(wait) = self.window_wait(&mut state, Instant::now()) {
            let horizon = Duration::from_secs(self.settings.max_wait_secs);
            if self.settings.fail_fast || wait > horizon {
                counter!("rate_limit_exceeded_total").increment(1);
                return Err(LeadError::RateLimitExceeded(format!(
                    "{} reached {} requests/hour, window reopens in {}s",
                    domain,
                    self.settings.requests_per_domain_per_hour,
                    wait.as_secs()
                )));
            }
            debug!(domain = %domain, wait_secs = wait.as_secs(), "Hourly cap reached, waiting for window");
            tokio::time::sleep(wait).await;
            self.window_wait(&mut state, Instant::now());
        }

        let delay = self.spacing(&state, crawl_delay);
        if let Some(last) = state.last_request {
            let ready_at = last + delay;
            if ready_at > Instant::now() {
                debug!(domain = %domain, delay_ms = delay.as_millis() as u64, "Waiting before next request");
                tokio::time::sleep_until(ready_at).await;
            }
        }

        let now = Instant::now();
        state.last_request = Some(now);
        match self.settings.hourly_window {
            HourlyWindow::Rolling => state.permits.push_back(now),
            HourlyWindow::Fixed => {
                if state.window_start.is_none() {
                    state.window_start = Some(now);
                }
                state.window_count += 1;
            }
        }

        Ok(RequestPermit {
            domain: domain.to_string(),
            state,
            backoff: self.backoff.clone(),
            latency_history: self.settings.latency_history,
            waited: now.saturating_duration_since(started),
        })
    }

    /// 获取域名的限流统计
    pub async fn stats(&self, domain: &str) -> Option<RateLimiterStats> {
        let slot = self.states.get(domain).map(|entry| entry.value().clone())?;
        let mut state = slot.lock().await;
        self.window_wait(&mut state, Instant::now());

        let requests_in_window = match self.settings.hourly_window {
            HourlyWindow::Rolling => state.permits.len() as u32,
            HourlyWindow::Fixed => state.window_count,
        };

        Some(RateLimiterStats {
            requests_in_window,
            consecutive_errors: state.consecutive_errors,
            backoff_multiplier: state.backoff_multiplier,
            latency_multiplier: self.latency_multiplier(&state),
        })
    }

    /// 重置域名的全部限流状态
    pub fn reset(&self, domain: &str) {
        self.states.remove(domain);
    }

    /// 计算本次请求所需的间隔
    ///
    /// `max(随机(下限, 上限), crawl_delay) × 自适应倍数 × 退避倍数`，上限为退避最大延迟
    fn spacing(&self, state: &RateLimiterState, crawl_delay: Option<Duration>) -> Duration {
        let jittered = jittered_delay(
            Duration::from_millis(self.settings.min_delay_ms),
            Duration::from_millis(self.settings.max_delay_ms),
        );
        let base = jittered.max(crawl_delay.unwrap_or(Duration::ZERO));
        let multiplier = self.latency_multiplier(state) * f64::from(state.backoff_multiplier);
        self.backoff.apply(base, multiplier)
    }

    /// 根据最近响应时间计算自适应倍数
    fn latency_multiplier(&self, state: &RateLimiterState) -> f64 {
        if state.latencies.is_empty() || self.settings.slow_response_ms == 0 {
            return 1.0;
        }
        let total: Duration = state.latencies.iter().sum();
        let mean = total.as_secs_f64() / state.latencies.len() as f64;
        let threshold = Duration::from_millis(self.settings.slow_response_ms).as_secs_f64();
        if mean > threshold {
            (mean / threshold).min(self.settings.max_latency_multiplier)
        } else {
            1.0
        }
    }

    /// 整理每小时窗口，返回还需等待多久才能放行
    fn window_wait(&self, state: &mut RateLimiterState, now: Instant) -> Option<Duration> {
        let cap = self.settings.requests_per_domain_per_hour;
        match self.settings.hourly_window {
            HourlyWindow::Rolling => {
                while let Some(oldest) = state.permits.front() {
                    if now.saturating_duration_since(*oldest) >= HOUR {
                        state.permits.pop_front();
                    } else {
                        break;
                    }
                }
                if state.permits.len() as u32 >= cap {
                    state
                        .permits
                        .front()
                        .map(|oldest| (*oldest + HOUR).saturating_duration_since(now))
                } else {
                    None
                }
            }
            HourlyWindow::Fixed => {
                if let Some(start) = state.window_start {
                    if now.saturating_duration_since(start) >= HOUR {
                        state.window_start = None;
                        state.window_count = 0;
                    }
                }
                match state.window_start {
                    Some(start) if state.window_count >= cap => {
                        Some((start + HOUR).saturating_duration_since(now))
                    }
                    _ => None,
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "rate_limiting_service_test.rs"]
mod tests;
