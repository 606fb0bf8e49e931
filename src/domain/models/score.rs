// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// 根据总分划分优先级，每个区间包含下边界
    ///
    /// # 参数
    ///
    /// * `total` - 总分
    /// * `high` - 高优先级下限
    /// * `medium` - 中优先级下限
    pub fn from_score(total: f64, high: f64, medium: f64) -> Self {
        if total >= high {
            Priority::High
        } else if total >= medium {
            Priority::Medium
        } else {
            Priority::Low
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

/// 五项分量得分，均为 0-100
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ComponentScores {
    pub role_match: f64,
    pub tech_match: f64,
    pub hiring_signals: f64,
    pub company_signals: f64,
    pub recency: f64,
}

/// 评分记录
///
/// 只追加的历史记录，重新评分不会修改之前的记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub domain: String,
    pub total: f64,
    pub priority: Priority,
    pub components: ComponentScores,
    pub matched_roles: Vec<String>,
    pub matched_tech: Vec<String>,
    pub matched_signals: Vec<String>,
    pub scored_at: DateTime<Utc>,
}
