// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::settings::{ScoringSettings, SignalCategory};
use crate::domain::models::company::CompanyProfile;
use crate::domain::models::score::{ComponentScores, Priority, ScoreRecord};
use crate::domain::services::extraction_service::SignalMatchers;
use crate::utils::errors::LeadError;

const MAX_COMPONENT: f64 = 100.0;
const SECONDS_PER_DAY: f64 = 86_400.0;
/// 没有更新时间的画像取中间值
const UNKNOWN_RECENCY: f64 = 50.0;

/// 线索评分引擎
///
/// 对公司画像计算五项 0-100 的分量得分，加权求和得到总分并划分优先级。
/// `score` 是纯函数：唯一与时间相关的输入是显式传入的参考时间。
pub struct ScoringEngine {
    settings: ScoringSettings,
    matchers: Arc<SignalMatchers>,
}

impl ScoringEngine {
    /// 创建评分引擎
    ///
    /// # 参数
    ///
    /// * `settings` - 评分配置
    /// * `matchers` - 编译后的匹配表，提供职位、技术和信号的权重
    ///
    /// # 返回值
    ///
    /// * `Ok(ScoringEngine)` - 创建成功
    /// * `Err(LeadError::ConfigurationError)` - 权重之和不为 1.0 或阈值不合法
    pub fn new(settings: ScoringSettings, matchers: Arc<SignalMatchers>) -> Result<Self, LeadError> {
        settings.weights.check_sum()?;
        if settings.tech_saturation_weight <= 0.0 {
            return Err(LeadError::ConfigurationError(
                "scoring.tech_saturation_weight must be positive".to_string(),
            ));
        }
        if settings.stale_days <= settings.fresh_days {
            return Err(LeadError::ConfigurationError(
                "scoring.stale_days must be greater than scoring.fresh_days".to_string(),
            ));
        }
        Ok(Self { settings, matchers })
    }

    pub fn settings(&self) -> &ScoringSettings {
        &self.settings
    }

    /// 对公司画像评分
    ///
    /// # 参数
    ///
    /// * `profile` - 公司画像
    /// * `now` - 参考时间，用于新鲜度计算和记录时间戳
    pub fn score(&self, profile: &CompanyProfile, now: DateTime<Utc>) -> ScoreRecord {
        let (role_match, matched_roles) = self.role_score(profile);
        let (tech_match, matched_tech) = self.tech_score(profile);
        let (hiring_signals, company_signals, matched_signals) = self.signal_scores(profile);
        let recency = self.recency_score(profile.last_updated, now);

        let components = ComponentScores {
            role_match,
            tech_match,
            hiring_signals,
            company_signals,
            recency,
        };
        let weights = &self.settings.weights;
        let total = role_match * weights.role_match
            + tech_match * weights.tech_match
            + hiring_signals * weights.hiring_signals
            + company_signals * weights.company_signals
            + recency * weights.recency;
        let total = total.clamp(0.0, MAX_COMPONENT);

        ScoreRecord {
            domain: profile.domain.clone(),
            total,
            priority: Priority::from_score(
                total,
                self.settings.high_priority_score,
                self.settings.min_lead_score,
            ),
            components,
            matched_roles,
            matched_tech,
            matched_signals,
            scored_at: now,
        }
    }

    /// 职位匹配：所有职位中最佳的 `职位权重 × 职级倍数 × 100`，上限 100
    fn role_score(&self, profile: &CompanyProfile) -> (f64, Vec<String>) {
        let mut best = 0.0_f64;
        let mut matched = Vec::new();
        for title in &profile.job_titles {
            if let Some((_, score)) = self.matchers.best_role_match(title) {
                best = best.max(score * MAX_COMPONENT);
                matched.push(title.clone());
            }
        }
        (best.min(MAX_COMPONENT), matched)
    }

    /// 技术匹配：命中关键词权重之和相对饱和权重的比例，上限 100
    fn tech_score(&self, profile: &CompanyProfile) -> (f64, Vec<String>) {
        let mut sum = 0.0;
        let mut matched = Vec::new();
        for keyword in &profile.tech_keywords {
            if let Some(weight) = self.matchers.tech_weight(keyword) {
                sum += weight;
                matched.push(keyword.clone());
            }
        }
        let score = (sum / self.settings.tech_saturation_weight * MAX_COMPONENT).min(MAX_COMPONENT);
        (score, matched)
    }

    /// 招聘信号与公司信号
    ///
    /// 招聘：招聘短语、活跃职位、招聘页；公司：融资、增长、远程、联系邮箱
    fn signal_scores(&self, profile: &CompanyProfile) -> (f64, f64, Vec<String>) {
        let points = &self.settings.points;
        let mut hiring = 0.0;
        let mut company = 0.0;
        let mut matched = Vec::new();

        for entry in &profile.hiring_signals {
            if let Some((category, value)) = self.matchers.signal_points(entry) {
                match category {
                    SignalCategory::Hiring => hiring += value,
                    SignalCategory::Funding | SignalCategory::Growth => company += value,
                }
                matched.push(entry.clone());
            }
        }
        if profile.has_job_listings {
            hiring += points.active_listings;
            matched.push("listings:active".to_string());
        }
        if profile.has_careers_page {
            hiring += points.careers_page;
            matched.push("careers_page".to_string());
        }
        if !profile.remote_indicators.is_empty() {
            company += points.remote;
            matched.extend(profile.remote_indicators.iter().map(|r| format!("remote:{}", r)));
        }
        if !profile.emails.is_empty() {
            company += points.contact_email;
            matched.push("contact_email".to_string());
        }

        (hiring.min(MAX_COMPONENT), company.min(MAX_COMPONENT), matched)
    }

    /// 新鲜度：`fresh_days` 内为 100，之后线性衰减，`stale_days` 起为 0；
    /// 更新时间未知时为 50
    fn recency_score(&self, last_updated: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
        let Some(last_updated) = last_updated else {
            return UNKNOWN_RECENCY;
        };
        let age_days = (now - last_updated).num_seconds().max(0) as f64 / SECONDS_PER_DAY;
        let fresh = self.settings.fresh_days as f64;
        let stale = self.settings.stale_days as f64;

        if age_days <= fresh {
            MAX_COMPONENT
        } else if age_days >= stale {
            0.0
        } else {
            MAX_COMPONENT * (1.0 - (age_days - fresh) / (stale - fresh))
        }
    }
}
