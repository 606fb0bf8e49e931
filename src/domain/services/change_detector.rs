// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::domain::models::change::{ChangeEvent, ChangeKind};
use crate::domain::models::company::{title_key, CompanyProfile};
use crate::domain::models::score::ScoreRecord;

/// 变更检测器
///
/// 比较同一域名两次运行的画像与评分，产生类型化的变更事件
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    score_change_threshold: f64,
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new(10.0)
    }
}

impl ChangeDetector {
    pub fn new(score_change_threshold: f64) -> Self {
        Self {
            score_change_threshold,
        }
    }

    /// 比较前后两次状态
    ///
    /// # 参数
    ///
    /// * `previous_profile` - 上次的公司画像，首次发现时为 `None`
    /// * `previous_score` - 上次的评分
    /// * `current_profile` - 本次的公司画像
    /// * `current_score` - 本次的评分
    /// * `detected_at` - 事件时间戳
    ///
    /// # 返回值
    ///
    /// 变更事件序列；相同输入比较自身时为空
    pub fn diff(
        &self,
        previous_profile: Option<&CompanyProfile>,
        previous_score: Option<&ScoreRecord>,
        current_profile: &CompanyProfile,
        current_score: &ScoreRecord,
        detected_at: DateTime<Utc>,
    ) -> Vec<ChangeEvent> {
        let domain = current_profile.domain.as_str();
        let event = |kind, old: Option<&str>, new: Option<&str>| {
            ChangeEvent::new(
                domain,
                kind,
                old.map(str::to_string),
                new.map(str::to_string),
                detected_at,
            )
        };

        let Some(previous) = previous_profile else {
            // Nothing to compare against: every title is new, no score delta
            return current_profile
                .job_titles
                .iter()
                .map(|title| {
                    with_careers_url(
                        event(ChangeKind::NewListing, None, Some(title.as_str())),
                        current_profile,
                    )
                })
                .collect();
        };

        let mut events = Vec::new();

        let before = title_keys(previous);
        let after = title_keys(current_profile);
        for title in &current_profile.job_titles {
            if !before.contains(&title_key(title)) {
                events.push(with_careers_url(
                    event(ChangeKind::NewListing, None, Some(title.as_str())),
                    current_profile,
                ));
            }
        }
        for title in &previous.job_titles {
            if !after.contains(&title_key(title)) {
                events.push(with_careers_url(
                    event(ChangeKind::RemovedListing, Some(title.as_str()), None),
                    previous,
                ));
            }
        }

        for (url, fingerprint) in &current_profile.page_fingerprints {
            if let Some(old) = previous.page_fingerprints.get(url) {
                if old != fingerprint {
                    let change = event(
                        ChangeKind::ContentChange,
                        Some(old.as_str()),
                        Some(fingerprint.as_str()),
                    );
                    events.push(change.with_url(url));
                }
            }
        }

        let before = signal_set(previous);
        for signal in signal_set(current_profile).difference(&before) {
            events.push(event(ChangeKind::NewSignal, None, Some(signal.as_str())));
        }

        if let Some(previous_score) = previous_score {
            let delta = (current_score.total - previous_score.total).abs();
            if delta >= self.score_change_threshold {
                events.push(event(
                    ChangeKind::ScoreChange,
                    Some(format!("{:.1}", previous_score.total).as_str()),
                    Some(format!("{:.1}", current_score.total).as_str()),
                ));
            }
        }

        events
    }
}

fn with_careers_url(event: ChangeEvent, profile: &CompanyProfile) -> ChangeEvent {
    match &profile.careers_url {
        Some(url) => event.with_url(url),
        None => event,
    }
}

fn title_keys(profile: &CompanyProfile) -> BTreeSet<String> {
    profile.job_titles.iter().map(|t| title_key(t)).collect()
}

/// 招聘/公司信号与远程指示的并集
fn signal_set(profile: &CompanyProfile) -> BTreeSet<String> {
    let mut signals: BTreeSet<String> = profile.hiring_signals.iter().cloned().collect();
    signals.extend(profile.remote_indicators.iter().map(|r| format!("remote:{}", r)));
    if profile.has_careers_page {
        signals.insert("careers_page".to_string());
    }
    if profile.has_job_listings {
        signals.insert("listings:active".to_string());
    }
    signals
}
