// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 变更类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    NewListing,
    RemovedListing,
    ContentChange,
    NewSignal,
    ScoreChange,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChangeKind::NewListing => write!(f, "new_listing"),
            ChangeKind::RemovedListing => write!(f, "removed_listing"),
            ChangeKind::ContentChange => write!(f, "content_change"),
            ChangeKind::NewSignal => write!(f, "new_signal"),
            ChangeKind::ScoreChange => write!(f, "score_change"),
        }
    }
}

/// 变更事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub domain: String,
    pub kind: ChangeKind,
    /// 发生变化的页面，评分变更为 `None`
    pub url: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub detected_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(
        domain: impl Into<String>,
        kind: ChangeKind,
        old_value: Option<String>,
        new_value: Option<String>,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            domain: domain.into(),
            kind,
            url: None,
            old_value,
            new_value,
            detected_at,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}
