// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 线索域名实体
///
/// 合规检查、限流和聚合的基本单位。首次发现时创建，
/// 从不删除，只会被标记为 blocked。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadDomain {
    /// 归一化后的域名
    pub domain: String,
    /// 发现分类（例如搜索模板的类别）
    pub category: Option<String>,
    /// 当前状态
    pub status: DomainStatus,
    /// 调用方提供的起始URL
    pub start_url: Option<String>,
    /// 最近一次 robots 检查时间
    pub last_robots_check: Option<DateTime<Utc>>,
    /// 缓存的抓取间隔（秒）
    pub crawl_delay_secs: Option<f64>,
    /// 被标记为 blocked 的原因
    pub blocked_reason: Option<String>,
    pub discovered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LeadDomain {
    /// 创建待处理的域名
    pub fn new(domain: impl Into<String>, category: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            domain: domain.into(),
            category,
            status: DomainStatus::Pending,
            start_url: None,
            last_robots_check: None,
            crawl_delay_secs: None,
            blocked_reason: None,
            discovered_at: now,
            updated_at: now,
        }
    }

    pub fn with_start_url(mut self, url: impl Into<String>) -> Self {
        self.start_url = Some(url.into());
        self
    }

    pub fn is_blocked(&self) -> bool {
        self.status == DomainStatus::Blocked
    }

    /// 标记为 blocked，之后不再抓取，直到人工清除
    pub fn mark_blocked(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        self.status = DomainStatus::Blocked;
        self.blocked_reason = Some(reason.into());
        self.updated_at = now;
    }

    /// 人工清除 blocked 状态
    pub fn clear_block(&mut self, now: DateTime<Utc>) {
        if self.is_blocked() {
            self.status = DomainStatus::Pending;
            self.blocked_reason = None;
            self.updated_at = now;
        }
    }
}

/// 域名状态
///
/// Pending → Scraped | Error；任何状态都可以因显式拒绝或黑名单进入 Blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DomainStatus {
    #[default]
    Pending,
    Scraped,
    Blocked,
    Error,
}

impl fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DomainStatus::Pending => write!(f, "pending"),
            DomainStatus::Scraped => write!(f, "scraped"),
            DomainStatus::Blocked => write!(f, "blocked"),
            DomainStatus::Error => write!(f, "error"),
        }
    }
}

impl FromStr for DomainStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(DomainStatus::Pending),
            "scraped" => Ok(DomainStatus::Scraped),
            "blocked" => Ok(DomainStatus::Blocked),
            "error" => Ok(DomainStatus::Error),
            _ => Err(format!("Invalid domain status: {}", s)),
        }
    }
}
