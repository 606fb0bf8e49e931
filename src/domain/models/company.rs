// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::page::{PageRecord, PageType};

/// 公司画像
///
/// 由某个域名的全部页面记录确定性地重建，从不手工编辑。
/// 集合使用有序容器，保证同样的输入得到完全相同的画像。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub domain: String,
    /// 取自页面标题
    pub name: Option<String>,
    /// 最近抓取到的招聘页URL
    pub careers_url: Option<String>,
    pub job_titles: BTreeSet<String>,
    pub tech_keywords: BTreeSet<String>,
    pub hiring_signals: BTreeSet<String>,
    pub remote_indicators: BTreeSet<String>,
    pub emails: BTreeSet<String>,
    pub has_careers_page: bool,
    pub has_apply_button: bool,
    pub has_job_listings: bool,
    /// 每个URL最近一次抓取的内容指纹
    pub page_fingerprints: BTreeMap<String, String>,
    pub page_count: usize,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl CompanyProfile {
    /// 没有任何页面的空画像
    pub fn empty(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            name: None,
            careers_url: None,
            job_titles: BTreeSet::new(),
            tech_keywords: BTreeSet::new(),
            hiring_signals: BTreeSet::new(),
            remote_indicators: BTreeSet::new(),
            emails: BTreeSet::new(),
            has_careers_page: false,
            has_apply_button: false,
            has_job_listings: false,
            page_fingerprints: BTreeMap::new(),
            page_count: 0,
            first_seen: None,
            last_updated: None,
        }
    }

    /// 从页面记录聚合出公司画像
    ///
    /// # 参数
    ///
    /// * `domain` - 域名
    /// * `pages` - 该域名的页面记录，顺序不影响结果
    ///
    /// # 返回值
    ///
    /// 聚合后的公司画像；不属于该域名的记录会被忽略
    pub fn from_pages(domain: &str, pages: &[PageRecord]) -> Self {
        let mut ordered: Vec<&PageRecord> = pages.iter().filter(|p| p.domain == domain).collect();
        ordered.sort_by(|a, b| a.fetched_at.cmp(&b.fetched_at).then_with(|| a.url.cmp(&b.url)));

        let mut profile = Self::empty(domain);
        let mut title_keys: BTreeSet<String> = BTreeSet::new();
        for page in &ordered {
            // Earliest spelling wins among titles differing only in case or spacing
            for title in &page.job_titles {
                if title_keys.insert(title_key(title)) {
                    profile.job_titles.insert(title.clone());
                }
            }
            profile.tech_keywords.extend(page.tech_keywords.iter().cloned());
            profile.hiring_signals.extend(page.hiring_signals.iter().cloned());
            profile.remote_indicators.extend(page.remote_indicators.iter().cloned());
            profile.emails.extend(page.emails.iter().cloned());
            profile.has_apply_button |= page.has_apply_button;
            profile.has_job_listings |= page.has_job_listings;

            if page.page_type == PageType::Careers {
                profile.has_careers_page = true;
                profile.careers_url = Some(page.url.clone());
            }
            if profile.name.is_none() {
                profile.name = page.title.as_deref().and_then(company_name_from_title);
            }
            if !page.fingerprint.is_empty() {
                profile
                    .page_fingerprints
                    .insert(page.url.clone(), page.fingerprint.clone());
            }
        }

        profile.page_count = ordered.len();
        profile.first_seen = ordered.first().map(|p| p.fetched_at);
        profile.last_updated = ordered.last().map(|p| p.fetched_at);
        profile
    }
}

/// 职位名比较键：小写并合并空白
pub fn title_key(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

const TITLE_SEPARATORS: [&str; 5] = ["|", " - ", " – ", " — ", ": "];

/// 从页面标题中取公司名：`Acme | Careers` → `Acme`
pub fn company_name_from_title(title: &str) -> Option<String> {
    let cut = TITLE_SEPARATORS
        .iter()
        .filter_map(|sep| title.find(sep))
        .min()
        .unwrap_or(title.len());
    let name = title[..cut].trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
