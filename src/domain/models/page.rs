// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 页面类型
///
/// 同时命中多个类型时按 Careers > JobListing > AboutTeam > Other 的优先级取值，
/// 枚举顺序即优先级顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Careers,
    JobListing,
    AboutTeam,
    #[default]
    Other,
}

impl PageType {
    /// 该类型页面上的链接是否值得继续跟进
    pub fn is_job_relevant(&self) -> bool {
        matches!(self, PageType::Careers | PageType::JobListing)
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PageType::Careers => write!(f, "careers"),
            PageType::JobListing => write!(f, "job_listing"),
            PageType::AboutTeam => write!(f, "about_team"),
            PageType::Other => write!(f, "other"),
        }
    }
}

/// 页面记录
///
/// 一次成功抓取的提取结果。创建后不可变，再次抓取会产生新的记录。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub id: Uuid,
    pub url: String,
    pub domain: String,
    pub page_type: PageType,
    /// 归一化文本的 sha256，仅用于变更比较
    pub fingerprint: String,
    pub title: Option<String>,
    pub job_titles: Vec<String>,
    /// 规范化后的技术关键词
    pub tech_keywords: Vec<String>,
    /// 形如 `hiring:we're hiring` 的信号，前缀为信号类别
    pub hiring_signals: Vec<String>,
    pub remote_indicators: Vec<String>,
    pub emails: Vec<String>,
    pub has_apply_button: bool,
    pub has_job_listings: bool,
    pub fetched_at: DateTime<Utc>,
}

impl PageRecord {
    /// 创建空的页面记录
    ///
    /// 内容无法解析时使用，仍然是合法记录
    pub fn empty(url: impl Into<String>, domain: impl Into<String>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            domain: domain.into(),
            page_type: PageType::Other,
            fingerprint: String::new(),
            title: None,
            job_titles: Vec::new(),
            tech_keywords: Vec::new(),
            hiring_signals: Vec::new(),
            remote_indicators: Vec::new(),
            emails: Vec::new(),
            has_apply_button: false,
            has_job_listings: false,
            fetched_at,
        }
    }
}
