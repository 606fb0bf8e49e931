// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use dashmap::DashMap;
use metrics::counter;
use robotstxt::DefaultMatcher;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::settings::{RobotsSettings, Settings};
use crate::engines::traits::{FetchError, FetchRequest, Fetcher};

/// 识别为 robots 指令的行前缀
const KNOWN_DIRECTIVES: [&str; 6] = [
    "user-agent",
    "allow",
    "disallow",
    "crawl-delay",
    "sitemap",
    "host",
];

/// 回退策略的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// robots 文件不存在 (404/410)
    NotFound,
    /// 其他 4xx 状态
    ClientError(u16),
    /// 5xx 或 429
    ServerError(u16),
    /// 超时或连接失败
    Unreachable(String),
    /// 内容无法识别为 robots 指令
    Malformed,
}

/// 缓存中的 robots 策略
#[derive(Debug, Clone, PartialEq)]
pub enum RobotsPolicy {
    /// 站点提供了可解析的 robots 文件
    Explicit {
        body: String,
        crawl_delay: Option<Duration>,
        site_wide_deny: bool,
    },
    /// 无法获得有效 robots 文件时的宽松但谨慎的策略
    FallbackPermissive {
        reason: FallbackReason,
        crawl_delay: Duration,
    },
}

/// 决策依据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyBasis {
    Explicit,
    FallbackPermissive,
}

/// 缓存条目可信度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    Normal,
    /// 5xx、不可达或内容异常，较早重新验证
    Low,
}

/// 单次 robots 查询的结果
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub crawl_delay: Option<Duration>,
    pub basis: PolicyBasis,
    /// robots 对本爬虫禁止整个站点
    pub site_wide_deny: bool,
}

/// 缓存状态报告
#[derive(Debug, Clone, PartialEq)]
pub struct RobotsStatus {
    pub basis: PolicyBasis,
    pub confidence: Confidence,
    pub crawl_delay: Option<Duration>,
    pub age: Duration,
    pub expires_in: Duration,
}

#[derive(Debug, Clone)]
struct CachedPolicy {
    policy: Arc<RobotsPolicy>,
    confidence: Confidence,
    fetched_at: Instant,
    expires_at: Instant,
}

impl CachedPolicy {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

type PolicySlot = Arc<Mutex<Option<CachedPolicy>>>;

/// Robots 策略缓存
///
/// 按域名缓存解析后的 robots 策略。同一域名的并发查询共享一次抓取：
/// 第一个调用方持有该域名的槽位锁完成抓取，其余调用方等待同一把锁后直接读取缓存。
pub struct RobotsPolicyCache {
    fetcher: Arc<dyn Fetcher>,
    settings: RobotsSettings,
    user_agent: String,
    scheme: String,
    entries: DashMap<String, PolicySlot>,
}

impl RobotsPolicyCache {
    /// 创建新的 robots 策略缓存
    ///
    /// # 参数
    ///
    /// * `fetcher` - 抓取 robots 文件使用的引擎
    /// * `settings` - robots 缓存配置
    /// * `user_agent` - 本爬虫的 User-Agent
    /// * `scheme` - 拼接 robots URL 时使用的协议
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        settings: RobotsSettings,
        user_agent: impl Into<String>,
        scheme: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            settings,
            user_agent: user_agent.into(),
            scheme: scheme.into(),
            entries: DashMap::new(),
        }
    }

    /// 根据完整配置创建
    pub fn from_settings(fetcher: Arc<dyn Fetcher>, settings: &Settings) -> Self {
        Self::new(
            fetcher,
            settings.robots.clone(),
            settings.crawler.user_agent.clone(),
            settings.crawler.scheme.clone(),
        )
    }

    /// 检查路径是否允许抓取
    ///
    /// 本方法不会失败：抓取 robots 文件时的任何问题都会转化为回退策略
    ///
    /// # 参数
    ///
    /// * `domain` - 归一化后的域名
    /// * `path` - 请求路径（可带查询串）
    ///
    /// # 返回值
    ///
    /// 允许与否、抓取间隔以及决策依据
    pub async fn check_allowed(&self, domain: &str, path: &str) -> PolicyDecision {
        let policy = self.policy_for(domain).await;
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };

        let decision = match policy.as_ref() {
            RobotsPolicy::Explicit {
                body,
                crawl_delay,
                site_wide_deny,
            } => {
                let url = format!("{}://{}{}", self.scheme, domain, path);
                let mut matcher = DefaultMatcher::default();
                let allowed = matcher.one_agent_allowed_by_robots(body, self.agent_token(), &url);
                PolicyDecision {
                    allowed,
                    crawl_delay: *crawl_delay,
                    basis: PolicyBasis::Explicit,
                    site_wide_deny: *site_wide_deny,
                }
            }
            RobotsPolicy::FallbackPermissive { crawl_delay, .. } => PolicyDecision {
                allowed: true,
                crawl_delay: Some(*crawl_delay),
                basis: PolicyBasis::FallbackPermissive,
                site_wide_deny: false,
            },
        };

        if !decision.allowed {
            counter!("robots_denied_total").increment(1);
            debug!(domain = %domain, path = %path, "Path disallowed by robots.txt");
        }

        decision
    }

    /// 获取域名的缓存状态
    pub async fn status(&self, domain: &str) -> Option<RobotsStatus> {
        let slot = self.entries.get(domain).map(|entry| entry.value().clone())?;
        let guard = slot.lock().await;
        let cached = guard.as_ref()?;
        let now = Instant::now();

        let (basis, crawl_delay) = match cached.policy.as_ref() {
            RobotsPolicy::Explicit { crawl_delay, .. } => (PolicyBasis::Explicit, *crawl_delay),
            RobotsPolicy::FallbackPermissive { crawl_delay, .. } => {
                (PolicyBasis::FallbackPermissive, Some(*crawl_delay))
            }
        };

        Some(RobotsStatus {
            basis,
            confidence: cached.confidence,
            crawl_delay,
            age: now.saturating_duration_since(cached.fetched_at),
            expires_in: cached.expires_at.saturating_duration_since(now),
        })
    }

    /// 清除某个域名的缓存
    pub fn clear(&self, domain: &str) {
        self.entries.remove(domain);
    }

    /// 清除全部缓存
    pub fn clear_all(&self) {
        self.entries.clear();
    }

    /// robots 匹配使用的产品标识，例如 `LeadCrawlBot/1.0` 中的 `LeadCrawlBot`
    fn agent_token(&self) -> &str {
        self.user_agent
            .split(['/', ' '])
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(self.user_agent.as_str())
    }

    /// 取得域名的有效策略，必要时抓取
    async fn policy_for(&self, domain: &str) -> Arc<RobotsPolicy> {
        // Clone the slot out so the map shard lock is released before awaiting
        let slot = self
            .entries
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .value()
            .clone();

        let mut guard = slot.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.is_fresh(Instant::now()) {
                return cached.policy.clone();
            }
            debug!(domain = %domain, "robots.txt cache entry expired, revalidating");
        }

        let (policy, confidence) = self.fetch_policy(domain).await;
        let ttl = match confidence {
            Confidence::Normal => Duration::from_secs(self.settings.cache_ttl_secs),
            Confidence::Low => Duration::from_secs(self.settings.low_confidence_ttl_secs),
        };
        let now = Instant::now();
        let policy = Arc::new(policy);
        *guard = Some(CachedPolicy {
            policy: policy.clone(),
            confidence,
            fetched_at: now,
            expires_at: now + ttl,
        });
        policy
    }

    async fn fetch_policy(&self, domain: &str) -> (RobotsPolicy, Confidence) {
        let robots_url = format!("{}://{}/robots.txt", self.scheme, domain);
        let request = FetchRequest::get(
            robots_url.as_str(),
            &self.user_agent,
            Duration::from_secs(self.settings.fetch_timeout_secs),
        );

        let result = self.fetcher.fetch(&request).await;
        let (policy, confidence) = match result {
            Ok(response) if response.is_success() => {
                if looks_malformed(&response.body) {
                    warn!(domain = %domain, "robots.txt content is malformed, using fallback policy");
                    (self.fallback(FallbackReason::Malformed), Confidence::Low)
                } else {
                    let groups = parse_groups(&response.body);
                    let group = applicable_group(&groups, self.agent_token());
                    let (crawl_delay, confidence) =
                        self.bounded_crawl_delay(domain, group.and_then(|g| g.crawl_delay_secs));
                    (
                        RobotsPolicy::Explicit {
                            crawl_delay,
                            site_wide_deny: group.is_some_and(AgentGroup::denies_all),
                            body: response.body,
                        },
                        confidence,
                    )
                }
            }
            Ok(response) if matches!(response.status_code, 404 | 410) => {
                info!(domain = %domain, "No robots.txt found, proceeding with conservative delay");
                (self.fallback(FallbackReason::NotFound), Confidence::Normal)
            }
            Ok(response) if response.status_code >= 500 || response.status_code == 429 => {
                warn!(domain = %domain, status = response.status_code, "robots.txt server error");
                (
                    self.fallback(FallbackReason::ServerError(response.status_code)),
                    Confidence::Low,
                )
            }
            Ok(response) => (
                self.fallback(FallbackReason::ClientError(response.status_code)),
                Confidence::Normal,
            ),
            Err(e) => {
                warn!(domain = %domain, error = %e, "robots.txt unreachable");
                let reason = match e {
                    FetchError::Timeout => "timeout".to_string(),
                    other => other.to_string(),
                };
                (self.fallback(FallbackReason::Unreachable(reason)), Confidence::Low)
            }
        };

        counter!("robots_fetch_total", "outcome" => outcome_label(&policy)).increment(1);
        (policy, confidence)
    }

    /// 将 robots 声明的抓取间隔限制在配置上限内
    ///
    /// 超出上限的值按上限处理，并把缓存条目降为低可信度以便较早重新验证
    fn bounded_crawl_delay(
        &self,
        domain: &str,
        declared_secs: Option<f64>,
    ) -> (Option<Duration>, Confidence) {
        let Some(secs) = declared_secs else {
            return (None, Confidence::Normal);
        };
        let max = Duration::from_secs(self.settings.max_crawl_delay_secs);
        match Duration::try_from_secs_f64(secs) {
            Ok(delay) if delay <= max => (Some(delay), Confidence::Normal),
            _ => {
                warn!(
                    domain = %domain,
                    declared_secs = secs,
                    max_secs = self.settings.max_crawl_delay_secs,
                    "robots.txt Crawl-delay out of range, clamping"
                );
                (Some(max), Confidence::Low)
            }
        }
    }

    fn fallback(&self, reason: FallbackReason) -> RobotsPolicy {
        RobotsPolicy::FallbackPermissive {
            reason,
            crawl_delay: Duration::try_from_secs_f64(self.settings.fallback_crawl_delay_secs)
                .unwrap_or(Duration::MAX)
                .min(Duration::from_secs(self.settings.max_crawl_delay_secs)),
        }
    }
}

fn outcome_label(policy: &RobotsPolicy) -> &'static str {
    match policy {
        RobotsPolicy::Explicit { .. } => "explicit",
        RobotsPolicy::FallbackPermissive { reason, .. } => match reason {
            FallbackReason::NotFound => "not_found",
            FallbackReason::ClientError(_) => "client_error",
            FallbackReason::ServerError(_) => "server_error",
            FallbackReason::Unreachable(_) => "unreachable",
            FallbackReason::Malformed => "malformed",
        },
    }
}

/// 内容是否不像 robots 文件
///
/// 空文件视为合法（允许全部）；HTML 页面或没有任何已知指令的内容视为异常
fn looks_malformed(body: &str) -> bool {
    let trimmed = body.trim_start();
    if trimmed.is_empty() {
        return false;
    }

    let head: String = trimmed.chars().take(64).collect::<String>().to_lowercase();
    if head.starts_with("<!doctype") || head.starts_with("<html") {
        return true;
    }

    !body.lines().any(|line| {
        directive(line).is_some_and(|(key, _)| KNOWN_DIRECTIVES.contains(&key.as_str()))
    })
}

/// 拆分一行指令为 (小写键, 值)，忽略注释
fn directive(line: &str) -> Option<(String, String)> {
    let line = line.split('#').next().unwrap_or("").trim();
    let (key, value) = line.split_once(':')?;
    Some((key.trim().to_lowercase(), value.trim().to_string()))
}

/// 一组共享规则的 User-agent
#[derive(Debug, Default, Clone)]
struct AgentGroup {
    agents: Vec<String>,
    allows: Vec<String>,
    disallows: Vec<String>,
    /// 原始声明值，尚未做范围限制
    crawl_delay_secs: Option<f64>,
}

impl AgentGroup {
    /// `Disallow: /` 且没有任何 Allow 例外
    fn denies_all(&self) -> bool {
        self.disallows.iter().any(|d| d == "/" || d == "/*")
            && self.allows.iter().all(|a| a.is_empty())
    }
}

fn parse_groups(body: &str) -> Vec<AgentGroup> {
    let mut groups: Vec<AgentGroup> = Vec::new();
    let mut current = AgentGroup::default();
    let mut in_rules = false;

    for line in body.lines() {
        let Some((key, value)) = directive(line) else {
            continue;
        };
        match key.as_str() {
            "user-agent" => {
                if in_rules {
                    groups.push(std::mem::take(&mut current));
                    in_rules = false;
                }
                current.agents.push(value.to_lowercase());
            }
            "allow" => {
                in_rules = true;
                current.allows.push(value);
            }
            "disallow" => {
                in_rules = true;
                if !value.is_empty() {
                    current.disallows.push(value);
                }
            }
            "crawl-delay" => {
                in_rules = true;
                if let Ok(secs) = value.parse::<f64>() {
                    if secs.is_finite() && secs >= 0.0 {
                        current.crawl_delay_secs = Some(secs);
                    }
                }
            }
            _ => {}
        }
    }
    if !current.agents.is_empty() {
        groups.push(current);
    }
    groups
}

/// 选择适用于本爬虫的规则组：先找名称匹配的组，再退回 `*`
fn applicable_group<'a>(groups: &'a [AgentGroup], agent_token: &str) -> Option<&'a AgentGroup> {
    let token = agent_token.to_lowercase();
    groups
        .iter()
        .find(|g| g.agents.iter().any(|a| a == &token))
        .or_else(|| groups.iter().find(|g| g.agents.iter().any(|a| a == "*")))
}
