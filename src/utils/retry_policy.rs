// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

use crate::config::settings::RateLimitingSettings;

/// 退避策略配置
///
/// 每次连续失败使延迟倍数翻倍，倍数与最终延迟都有上限
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// 最大退避倍数
    pub max_multiplier: u32,
    /// 退避后的最大延迟
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_multiplier: 64,
            max_delay: Duration::from_secs(300),
        }
    }
}

impl BackoffPolicy {
    /// 根据限流配置创建
    pub fn from_settings(settings: &RateLimitingSettings) -> Self {
        Self {
            max_multiplier: settings.max_backoff_multiplier.max(1),
            max_delay: Duration::from_secs(settings.max_backoff_secs),
        }
    }

    /// 计算连续失败 `consecutive_errors` 次后的退避倍数
    ///
    /// # 返回值
    ///
    /// `min(2^k, max_multiplier)`，k 为 0 时为 1
    pub fn multiplier(&self, consecutive_errors: u32) -> u32 {
        // 2^31 already exceeds any sane cap
        let exp = consecutive_errors.min(31);
        (1u32 << exp).min(self.max_multiplier)
    }

    /// 对基础延迟应用退避倍数
    ///
    /// 结果不超过 `max_delay`，但也不会低于基础延迟本身
    pub fn apply(&self, base: Duration, multiplier: f64) -> Duration {
        let scaled = base.as_secs_f64() * multiplier.max(1.0);
        let ceiling = self.max_delay.max(base).as_secs_f64();
        Duration::from_secs_f64(scaled.min(ceiling))
    }
}

/// 在 `[min, max]` 区间内均匀随机取一个延迟
pub fn jittered_delay(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let millis = rand::random_range(min.as_millis() as u64..=max.as_millis() as u64);
    Duration::from_millis(millis)
}
