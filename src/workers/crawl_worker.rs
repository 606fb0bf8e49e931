// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::Utc;
use metrics::counter;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::settings::Settings;
use crate::domain::models::change::ChangeEvent;
use crate::domain::models::company::CompanyProfile;
use crate::domain::models::lead_domain::{DomainStatus, LeadDomain};
use crate::domain::models::page::PageRecord;
use crate::domain::models::score::{Priority, ScoreRecord};
use crate::domain::repositories::domain_repository::DomainRepository;
use crate::domain::repositories::lead_repository::LeadRepository;
use crate::domain::repositories::page_repository::PageRepository;
use crate::domain::services::change_detector::ChangeDetector;
use crate::domain::services::crawl_service::{
    CrawlConfig, CrawlOutcome, CrawlScheduler, LinkDiscoverer,
};
use crate::domain::services::extraction_service::{SignalExtractor, SignalMatchers};
use crate::domain::services::rate_limiting_service::DomainRateLimiter;
use crate::domain::services::scoring_service::ScoringEngine;
use crate::engines::traits::Fetcher;
use crate::utils::errors::LeadError;
use crate::utils::robots::RobotsPolicyCache;
use crate::utils::url_utils::domain_root_url;

/// 工作者选项
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub scheme: String,
    pub max_pages: usize,
    pub probe_careers_paths: bool,
}

impl WorkerOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            scheme: settings.crawler.scheme.clone(),
            max_pages: settings.crawler.max_pages_per_domain,
            probe_careers_paths: settings.crawler.probe_careers_paths,
        }
    }
}

/// 单个域名本次运行的结果摘要
#[derive(Debug, Clone, Serialize)]
pub struct DomainRunSummary {
    pub domain: String,
    pub outcome: CrawlOutcome,
    pub status: DomainStatus,
    pub pages: usize,
    pub attempts: usize,
    pub skipped_by_policy: usize,
    pub score: Option<f64>,
    pub priority: Option<Priority>,
    pub changes: Vec<ChangeEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DomainRunSummary {
    /// 处理过程中出现仓库错误时的摘要
    pub fn failed(domain: &str, error: &LeadError) -> Self {
        Self {
            domain: domain.to_string(),
            outcome: CrawlOutcome::Abandoned,
            status: DomainStatus::Error,
            pages: 0,
            attempts: 0,
            skipped_by_policy: 0,
            score: None,
            priority: None,
            changes: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

/// 爬取工作者
///
/// 处理单个域名：爬取、保存页面、聚合画像、评分并与上次运行比较
pub struct CrawlWorker {
    scheduler: Arc<CrawlScheduler>,
    scoring: Arc<ScoringEngine>,
    detector: ChangeDetector,
    domains: Arc<dyn DomainRepository>,
    pages: Arc<dyn PageRepository>,
    leads: Arc<dyn LeadRepository>,
    options: WorkerOptions,
}

impl CrawlWorker {
    /// 创建新的爬取工作者
    ///
    /// # 参数
    ///
    /// * `scheduler` - 爬取调度器
    /// * `scoring` - 评分引擎
    /// * `detector` - 变更检测器
    /// * `domains` - 域名仓库
    /// * `pages` - 页面仓库
    /// * `leads` - 线索仓库
    /// * `options` - 工作者选项
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scheduler: Arc<CrawlScheduler>,
        scoring: Arc<ScoringEngine>,
        detector: ChangeDetector,
        domains: Arc<dyn DomainRepository>,
        pages: Arc<dyn PageRepository>,
        leads: Arc<dyn LeadRepository>,
        options: WorkerOptions,
    ) -> Self {
        Self {
            scheduler,
            scoring,
            detector,
            domains,
            pages,
            leads,
            options,
        }
    }

    /// 处理单个域名
    ///
    /// # 参数
    ///
    /// * `domain` - 待处理的域名；仓库中不存在时会先创建
    /// * `cancel` - 运行级取消信号
    ///
    /// # 返回值
    ///
    /// * `Ok(DomainRunSummary)` - 本次运行的结果
    /// * `Err(LeadError)` - 仓库读写失败
    pub async fn process(
        &self,
        domain: LeadDomain,
        cancel: &CancellationToken,
    ) -> Result<DomainRunSummary, LeadError> {
        let mut record = match self.domains.find(&domain.domain).await? {
            Some(mut existing) => {
                if domain.start_url.is_some() && existing.start_url != domain.start_url {
                    existing.start_url = domain.start_url;
                    self.domains.upsert(&existing).await?;
                }
                existing
            }
            None => {
                self.domains.upsert(&domain).await?;
                domain
            }
        };
        let name = record.domain.clone();

        if record.is_blocked() {
            info!(domain = %name, reason = ?record.blocked_reason, "Domain is blocked, not fetching");
            return Ok(self.summary(&record, CrawlOutcome::Blocked, 0, 0, 0, None, Vec::new()));
        }

        let seeds = self.seeds(&record);
        let report = self
            .scheduler
            .crawl_seeds(&name, seeds, self.options.max_pages, cancel)
            .await;

        let now = Utc::now();
        for page in &report.pages {
            self.pages.append(page).await?;
        }

        if report.robots_consulted {
            record.last_robots_check = Some(now);
            record.crawl_delay_secs = report.crawl_delay.map(|d| d.as_secs_f64());
            record.updated_at = now;
            self.domains.upsert(&record).await?;
        }

        let status = match report.outcome {
            CrawlOutcome::Blocked => Some(DomainStatus::Blocked),
            CrawlOutcome::Abandoned => Some(DomainStatus::Error),
            _ if !report.pages.is_empty() => Some(DomainStatus::Scraped),
            // Nothing fetched, e.g. every path denied by robots
            _ => None,
        };
        if let Some(status) = status {
            record = self
                .domains
                .update_status(&name, status, report.blocked_reason.clone(), now)
                .await?;
        }

        let (score, changes) = if report.pages.is_empty() {
            (None, Vec::new())
        } else {
            let (score, changes) = self.score_and_diff(&name, now).await?;
            (Some(score), changes)
        };

        Ok(self.summary(
            &record,
            report.outcome,
            report.pages.len(),
            report.attempts,
            report.skipped_by_policy.len(),
            score,
            changes,
        ))
    }

    /// 根据配置装配完整的处理链
    ///
    /// 校验配置、编译匹配表，并为 robots 与页面抓取共享同一个抓取引擎
    ///
    /// # 返回值
    ///
    /// * `Ok(CrawlWorker)` - 装配成功
    /// * `Err(LeadError::ConfigurationError)` - 配置不合法
    pub fn from_settings(
        settings: &Settings,
        fetcher: Arc<dyn Fetcher>,
        domains: Arc<dyn DomainRepository>,
        pages: Arc<dyn PageRepository>,
        leads: Arc<dyn LeadRepository>,
    ) -> Result<Self, LeadError> {
        settings.validate_all()?;
        let matchers = Arc::new(SignalMatchers::compile(&settings.matchers)?);
        let scoring = Arc::new(ScoringEngine::new(settings.scoring.clone(), matchers.clone())?);
        let robots = Arc::new(RobotsPolicyCache::from_settings(fetcher.clone(), settings));
        let limiter = Arc::new(DomainRateLimiter::new(settings.rate_limiting.clone()));
        let scheduler = Arc::new(CrawlScheduler::new(
            robots,
            limiter,
            fetcher,
            SignalExtractor::new(matchers),
            CrawlConfig::from_settings(settings),
        ));

        Ok(Self::new(
            scheduler,
            scoring,
            ChangeDetector::new(settings.scoring.score_change_threshold),
            domains,
            pages,
            leads,
            WorkerOptions::from_settings(settings),
        ))
    }

    fn seeds(&self, record: &LeadDomain) -> Vec<String> {
        if let Some(start) = &record.start_url {
            return vec![start.clone()];
        }
        let mut seeds = vec![format!(
            "{}/",
            domain_root_url(&self.options.scheme, &record.domain)
        )];
        if self.options.probe_careers_paths {
            seeds.extend(LinkDiscoverer::careers_candidates(
                &self.options.scheme,
                &record.domain,
            ));
        }
        seeds
    }

    /// 重建画像、评分并与上次运行比较，结果写入仓库
    async fn score_and_diff(
        &self,
        domain: &str,
        now: chrono::DateTime<Utc>,
    ) -> Result<(ScoreRecord, Vec<ChangeEvent>), LeadError> {
        let pages = latest_per_url(self.pages.find_by_domain(domain).await?);
        let profile = CompanyProfile::from_pages(domain, &pages);

        let previous_profile = self.leads.latest_profile(domain).await?;
        let previous_score = self.leads.latest_score(domain).await?;

        let score = self.scoring.score(&profile, now);
        let changes = self.detector.diff(
            previous_profile.as_ref(),
            previous_score.as_ref(),
            &profile,
            &score,
            now,
        );

        self.leads.save_profile(&profile).await?;
        self.leads.append_score(&score).await?;
        self.leads.append_changes(&changes).await?;

        counter!("leads_scored_total", "priority" => score.priority.to_string()).increment(1);
        for change in &changes {
            counter!("change_events_total", "kind" => change.kind.to_string()).increment(1);
            info!(
                domain = %domain,
                kind = %change.kind,
                old = ?change.old_value,
                new = ?change.new_value,
                "Change detected"
            );
        }

        match score.priority {
            Priority::High => info!(
                domain = %domain,
                score = score.total,
                roles = ?score.matched_roles,
                "High-priority lead"
            ),
            _ => info!(domain = %domain, score = score.total, priority = %score.priority, "Lead scored"),
        }

        Ok((score, changes))
    }

    #[allow(clippy::too_many_arguments)]
    fn summary(
        &self,
        record: &LeadDomain,
        outcome: CrawlOutcome,
        pages: usize,
        attempts: usize,
        skipped_by_policy: usize,
        score: Option<ScoreRecord>,
        changes: Vec<ChangeEvent>,
    ) -> DomainRunSummary {
        if outcome == CrawlOutcome::Abandoned {
            warn!(domain = %record.domain, pages, "Domain crawl abandoned, keeping partial results");
        }
        DomainRunSummary {
            domain: record.domain.clone(),
            outcome,
            status: record.status,
            pages,
            attempts,
            skipped_by_policy,
            score: score.as_ref().map(|s| s.total),
            priority: score.map(|s| s.priority),
            changes,
            error: None,
        }
    }
}

/// 每个URL只保留最近一次抓取的记录，保持首次出现的顺序
fn latest_per_url(pages: Vec<PageRecord>) -> Vec<PageRecord> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut latest: Vec<PageRecord> = Vec::new();
    for page in pages {
        match index.get(&page.url) {
            Some(&i) => latest[i] = page,
            None => {
                index.insert(page.url.clone(), latest.len());
                latest.push(page);
            }
        }
    }
    latest
}
