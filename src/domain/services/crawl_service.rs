// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::Utc;
use metrics::counter;
use scraper::{Html, Selector};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::settings::Settings;
use crate::domain::models::page::PageRecord;
use crate::domain::services::extraction_service::SignalExtractor;
use crate::domain::services::rate_limiting_service::DomainRateLimiter;
use crate::engines::traits::{FetchError, FetchRequest, Fetcher};
use crate::utils::errors::LeadError;
use crate::utils::robots::RobotsPolicyCache;
use crate::utils::url_utils::{domain_root_url, is_blocklisted, is_same_domain, resolve_url};

/// 常见招聘页路径，供调用方生成起始URL
const CAREERS_PATHS: &[&str] = &[
    "/careers",
    "/jobs",
    "/work-with-us",
    "/join-us",
    "/about/careers",
    "/company/careers",
];

/// 链接路径中表示与招聘相关的片段
const JOB_PATH_TOKENS: &[&str] = &[
    "career",
    "job",
    "opening",
    "position",
    "vacanc",
    "join",
    "hiring",
    "work-with-us",
    "role",
];

/// 一次域名爬取的结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlOutcome {
    /// 队列耗尽或达到页数上限
    Completed,
    /// 连续失败达到上限，放弃本次运行中的剩余页面
    Abandoned,
    /// 每小时上限已用尽
    RateLimited,
    /// 收到运行级取消信号
    Cancelled,
    /// 黑名单或 robots 禁止整个站点
    Blocked,
}

impl fmt::Display for CrawlOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CrawlOutcome::Completed => write!(f, "completed"),
            CrawlOutcome::Abandoned => write!(f, "abandoned"),
            CrawlOutcome::RateLimited => write!(f, "rate_limited"),
            CrawlOutcome::Cancelled => write!(f, "cancelled"),
            CrawlOutcome::Blocked => write!(f, "blocked"),
        }
    }
}

/// 单个域名的爬取报告
///
/// 提前结束时 `pages` 仍包含已完成的页面，按抓取顺序排列
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub domain: String,
    pub outcome: CrawlOutcome,
    pub pages: Vec<PageRecord>,
    /// 实际发起的抓取次数
    pub attempts: usize,
    pub failures: usize,
    /// 被 robots 拒绝而跳过的URL
    pub skipped_by_policy: Vec<String>,
    /// 是否查询过 robots 策略
    pub robots_consulted: bool,
    /// robots 给出的抓取间隔
    pub crawl_delay: Option<Duration>,
    pub blocked_reason: Option<String>,
    pub last_error: Option<LeadError>,
}

impl CrawlReport {
    fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            outcome: CrawlOutcome::Completed,
            pages: Vec::new(),
            attempts: 0,
            failures: 0,
            skipped_by_policy: Vec::new(),
            robots_consulted: false,
            crawl_delay: None,
            blocked_reason: None,
            last_error: None,
        }
    }
}

/// 调度器配置
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub user_agent: String,
    pub fetch_timeout: Duration,
    pub max_consecutive_failures: u32,
    pub blocklist: Vec<String>,
}

impl CrawlConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            user_agent: settings.crawler.user_agent.clone(),
            fetch_timeout: settings.crawler.fetch_timeout(),
            max_consecutive_failures: settings.crawler.max_consecutive_failures,
            blocklist: settings.blocklist.clone(),
        }
    }
}

/// 爬取调度器
///
/// 对单个域名依次执行：robots 检查、限流等待、抓取、分类提取。
/// robots 缓存与限流器由外部注入，调度器只通过它们的公开接口访问状态。
pub struct CrawlScheduler {
    robots: Arc<RobotsPolicyCache>,
    limiter: Arc<DomainRateLimiter>,
    fetcher: Arc<dyn Fetcher>,
    extractor: SignalExtractor,
    config: CrawlConfig,
}

impl CrawlScheduler {
    /// 创建新的爬取调度器
    ///
    /// # 参数
    ///
    /// * `robots` - robots 策略缓存
    /// * `limiter` - 按域名的限流器
    /// * `fetcher` - 页面抓取引擎
    /// * `extractor` - 页面信号提取器
    /// * `config` - 调度器配置
    pub fn new(
        robots: Arc<RobotsPolicyCache>,
        limiter: Arc<DomainRateLimiter>,
        fetcher: Arc<dyn Fetcher>,
        extractor: SignalExtractor,
        config: CrawlConfig,
    ) -> Self {
        Self {
            robots,
            limiter,
            fetcher,
            extractor,
            config,
        }
    }

    /// 爬取单个域名
    ///
    /// # 参数
    ///
    /// * `domain` - 归一化后的域名
    /// * `start_url` - 调用方提供的起始URL
    /// * `max_pages` - 本次运行的最大抓取次数
    /// * `cancel` - 运行级取消信号，只在两次抓取之间检查
    pub async fn crawl_domain(
        &self,
        domain: &str,
        start_url: &str,
        max_pages: usize,
        cancel: &CancellationToken,
    ) -> CrawlReport {
        self.crawl_seeds(domain, vec![start_url.to_string()], max_pages, cancel)
            .await
    }

    /// 从多个种子URL开始爬取单个域名
    ///
    /// 种子按顺序排在队列前部，之后是从种子页面和招聘相关页面发现的链接
    pub async fn crawl_seeds(
        &self,
        domain: &str,
        seeds: Vec<String>,
        max_pages: usize,
        cancel: &CancellationToken,
    ) -> CrawlReport {
        let mut report = CrawlReport::new(domain);

        if is_blocklisted(domain, &self.config.blocklist) {
            info!(domain = %domain, "Domain is blocklisted, skipping crawl");
            report.outcome = CrawlOutcome::Blocked;
            report.blocked_reason = Some("blocklist".to_string());
            return report;
        }

        let mut queue: VecDeque<Url> = VecDeque::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut seed_urls: HashSet<String> = HashSet::new();
        for seed in seeds {
            match Url::parse(&seed) {
                Ok(mut url) if is_same_domain(&url, domain) => {
                    url.set_fragment(None);
                    if seen.insert(url.to_string()) {
                        seed_urls.insert(url.to_string());
                        queue.push_back(url);
                    }
                }
                Ok(_) => warn!(domain = %domain, url = %seed, "Seed URL is outside the domain"),
                Err(e) => warn!(domain = %domain, url = %seed, error = %e, "Invalid seed URL"),
            }
        }

        let mut consecutive_failures = 0u32;

        while let Some(url) = queue.pop_front() {
            if cancel.is_cancelled() {
                report.outcome = CrawlOutcome::Cancelled;
                break;
            }
            if report.attempts >= max_pages {
                debug!(domain = %domain, max_pages, "Page budget reached");
                break;
            }

            let path = match url.query() {
                Some(query) => format!("{}?{}", url.path(), query),
                None => url.path().to_string(),
            };
            let decision = self.robots.check_allowed(domain, &path).await;
            report.robots_consulted = true;
            report.crawl_delay = decision.crawl_delay;

            if decision.site_wide_deny {
                info!(domain = %domain, "robots.txt disallows the whole site");
                report.outcome = CrawlOutcome::Blocked;
                report.blocked_reason = Some("robots.txt disallows all paths".to_string());
                report.last_error = Some(LeadError::PolicyDenied(format!(
                    "{} disallows all paths for this crawler",
                    domain
                )));
                break;
            }
            if !decision.allowed {
                debug!(domain = %domain, url = %url, "Skipping URL disallowed by robots.txt");
                report.skipped_by_policy.push(url.to_string());
                continue;
            }

            let acquired = tokio::select! {
                _ = cancel.cancelled() => None,
                permit = self.limiter.acquire(domain, decision.crawl_delay) => Some(permit),
            };
            let permit = match acquired {
                None => {
                    report.outcome = CrawlOutcome::Cancelled;
                    break;
                }
                Some(Ok(permit)) => permit,
                Some(Err(e)) => {
                    info!(domain = %domain, error = %e, "Hourly request cap reached, ending crawl");
                    report.outcome = CrawlOutcome::RateLimited;
                    report.last_error = Some(e);
                    break;
                }
            };

            report.attempts += 1;
            counter!("fetch_attempts_total").increment(1);

            let started = Instant::now();
            match self.fetch(&url).await {
                Ok(body) => {
                    permit.success(started.elapsed());
                    consecutive_failures = 0;

                    let record =
                        self.extractor
                            .classify_and_extract(url.as_str(), domain, &body, Utc::now());
                    debug!(
                        domain = %domain,
                        url = %url,
                        page_type = %record.page_type,
                        titles = record.job_titles.len(),
                        "Page extracted"
                    );

                    // Seeds are entry points, so their job links are followed whatever their type
                    if record.page_type.is_job_relevant() || seed_urls.contains(url.as_str()) {
                        for link in LinkDiscoverer::job_links(&body, &url, domain) {
                            if seen.insert(link.to_string()) {
                                queue.push_back(link);
                            }
                        }
                    }
                    report.pages.push(record);
                }
                Err(e) => {
                    permit.failure(&e);
                    consecutive_failures += 1;
                    report.failures += 1;
                    counter!("fetch_failures_total", "kind" => failure_kind(&e)).increment(1);
                    warn!(
                        domain = %domain,
                        url = %url,
                        error = %e,
                        consecutive_failures,
                        "Fetch failed"
                    );
                    report.last_error = Some(e);

                    if consecutive_failures >= self.config.max_consecutive_failures {
                        warn!(domain = %domain, "Consecutive failure ceiling reached, abandoning domain");
                        report.outcome = CrawlOutcome::Abandoned;
                        break;
                    }
                }
            }
        }

        info!(
            domain = %domain,
            outcome = %report.outcome,
            pages = report.pages.len(),
            attempts = report.attempts,
            skipped = report.skipped_by_policy.len(),
            "Domain crawl finished"
        );
        report
    }

    /// 抓取单个URL，非 2xx 响应转换为对应的错误类型
    async fn fetch(&self, url: &Url) -> Result<String, LeadError> {
        let request = FetchRequest::get(
            url.as_str(),
            &self.config.user_agent,
            self.config.fetch_timeout,
        );
        let response = tokio::time::timeout(self.config.fetch_timeout, self.fetcher.fetch(&request))
            .await
            .unwrap_or(Err(FetchError::Timeout))
            .map_err(|e| LeadError::from_fetch(url.as_str(), e))?;

        if response.is_success() {
            Ok(response.body)
        } else {
            Err(LeadError::from_fetch(
                url.as_str(),
                FetchError::Status(response.status_code),
            ))
        }
    }
}

fn failure_kind(error: &LeadError) -> &'static str {
    match error {
        LeadError::FetchTimeout(_) => "timeout",
        LeadError::FetchConnectionError(_) => "connection",
        LeadError::FetchServerError { .. } => "server",
        LeadError::FetchClientError { .. } => "client",
        _ => "other",
    }
}

/// 链接发现器
pub struct LinkDiscoverer;

impl LinkDiscoverer {
    /// 从HTML内容中提取链接
    ///
    /// # 参数
    ///
    /// * `html_content` - HTML内容
    /// * `base` - 基础URL
    ///
    /// # 返回值
    ///
    /// 去掉片段后的 http/https 链接，按字典序排列
    pub fn extract_links(html_content: &str, base: &Url) -> BTreeSet<Url> {
        let document = Html::parse_document(html_content);
        let Ok(selector) = Selector::parse("a[href]") else {
            return BTreeSet::new();
        };
        let mut links = BTreeSet::new();

        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let href = href.trim();
            if href.starts_with('#') || href.starts_with("mailto:") || href.starts_with("javascript:") {
                continue;
            }
            if let Ok(mut url) = resolve_url(base, href) {
                if url.scheme() == "http" || url.scheme() == "https" {
                    url.set_fragment(None);
                    links.insert(url);
                }
            }
        }

        links
    }

    /// 同域名且路径与招聘相关的链接
    ///
    /// 只跟进路径中带有招聘片段的链接，避免遍历整个站点
    pub fn job_links(html_content: &str, base: &Url, domain: &str) -> Vec<Url> {
        Self::extract_links(html_content, base)
            .into_iter()
            .filter(|url| is_same_domain(url, domain))
            .filter(|url| {
                let path = url.path().to_lowercase();
                JOB_PATH_TOKENS.iter().any(|token| path.contains(token))
            })
            .collect()
    }

    /// 常见招聘页的候选URL
    ///
    /// # 参数
    ///
    /// * `scheme` - 协议
    /// * `domain` - 域名
    pub fn careers_candidates(scheme: &str, domain: &str) -> Vec<String> {
        let root = domain_root_url(scheme, domain);
        let root = root.trim_end_matches('/');
        CAREERS_PATHS
            .iter()
            .map(|path| format!("{}{}", root, path))
            .collect()
    }
}

#[cfg(test)]
#[path = "crawl_service_test.rs"]
mod tests;
