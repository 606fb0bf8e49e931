// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use validator::Validate;

use crate::utils::errors::LeadError;

/// 权重求和允许的浮点误差
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// 应用程序配置设置
///
/// 包含爬取、限流、robots 缓存、评分、匹配表和黑名单等所有配置项
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct Settings {
    /// 爬取配置
    #[validate(nested)]
    pub crawler: CrawlerSettings,
    /// 速率限制配置
    #[validate(nested)]
    pub rate_limiting: RateLimitingSettings,
    /// robots 缓存配置
    #[validate(nested)]
    pub robots: RobotsSettings,
    /// 评分配置
    #[validate(nested)]
    pub scoring: ScoringSettings,
    /// 匹配表配置
    pub matchers: MatcherSettings,
    /// 运营方黑名单（精确域名，子域名同样命中）
    #[serde(default)]
    pub blocklist: Vec<String>,
}

/// 爬取配置设置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CrawlerSettings {
    /// 请求协议 (https, http)
    pub scheme: String,
    /// 请求使用的 User-Agent
    #[validate(length(min = 1))]
    pub user_agent: String,
    /// 单次抓取超时时间（秒）
    #[validate(range(min = 1))]
    pub fetch_timeout_secs: u64,
    /// 每个域名每次运行的最大抓取次数
    #[validate(range(min = 1))]
    pub max_pages_per_domain: usize,
    /// 连续失败多少次后放弃该域名
    #[validate(range(min = 1))]
    pub max_consecutive_failures: u32,
    /// 并发工作者数量
    #[validate(range(min = 1))]
    pub workers: usize,
    /// 没有起始URL时是否把常见招聘页路径加入种子
    #[serde(default)]
    pub probe_careers_paths: bool,
}

impl Default for CrawlerSettings {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            user_agent: "LeadCrawlBot/1.0".to_string(),
            fetch_timeout_secs: 15,
            max_pages_per_domain: 5,
            max_consecutive_failures: 3,
            workers: 4,
            probe_careers_paths: false,
        }
    }
}

impl CrawlerSettings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// 每小时上限的窗口类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HourlyWindow {
    /// 滑动 60 分钟窗口
    #[default]
    Rolling,
    /// 固定窗口，从窗口内第一次请求开始计时
    Fixed,
}

/// 速率限制配置设置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RateLimitingSettings {
    /// 请求间隔下限（毫秒）
    pub min_delay_ms: u64,
    /// 请求间隔上限（毫秒）
    pub max_delay_ms: u64,
    /// 每个域名每小时的请求上限
    #[validate(range(min = 1))]
    pub requests_per_domain_per_hour: u32,
    /// 每小时窗口类型
    #[serde(default)]
    pub hourly_window: HourlyWindow,
    /// 达到上限时是否立即失败
    pub fail_fast: bool,
    /// 达到上限时愿意等待的最长时间（秒）
    pub max_wait_secs: u64,
    /// 退避后的最大间隔（秒）
    #[validate(range(min = 1))]
    pub max_backoff_secs: u64,
    /// 退避倍数上限
    #[validate(range(min = 1))]
    pub max_backoff_multiplier: u32,
    /// 响应变慢的阈值（毫秒）
    pub slow_response_ms: u64,
    /// 自适应延迟倍数上限
    #[validate(range(min = 1.0))]
    pub max_latency_multiplier: f64,
    /// 保留的响应时间样本数
    #[validate(range(min = 1))]
    pub latency_history: usize,
}

impl Default for RateLimitingSettings {
    fn default() -> Self {
        Self {
            min_delay_ms: 2_000,
            max_delay_ms: 5_000,
            requests_per_domain_per_hour: 20,
            hourly_window: HourlyWindow::Rolling,
            fail_fast: false,
            max_wait_secs: 900,
            max_backoff_secs: 300,
            max_backoff_multiplier: 64,
            slow_response_ms: 2_000,
            max_latency_multiplier: 3.0,
            latency_history: 10,
        }
    }
}

/// robots 缓存配置设置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RobotsSettings {
    /// 正常缓存有效期（秒）
    #[validate(range(min = 1))]
    pub cache_ttl_secs: u64,
    /// 低可信度缓存有效期（秒）
    #[validate(range(min = 1))]
    pub low_confidence_ttl_secs: u64,
    /// 无 robots 文件时使用的保守抓取间隔（秒）
    #[validate(range(min = 0.0))]
    pub fallback_crawl_delay_secs: f64,
    /// 获取 robots 文件的超时时间（秒）
    #[validate(range(min = 1))]
    pub fetch_timeout_secs: u64,
    /// 接受的最大 Crawl-delay（秒），更大的声明值按此处理
    #[validate(range(min = 1))]
    pub max_crawl_delay_secs: u64,
}

impl Default for RobotsSettings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 24 * 3600,
            low_confidence_ttl_secs: 3600,
            fallback_crawl_delay_secs: 5.0,
            fetch_timeout_secs: 10,
            max_crawl_delay_secs: 300,
        }
    }
}

/// 评分权重
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ScoringWeights {
    #[validate(range(min = 0.0, max = 1.0))]
    pub role_match: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub tech_match: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub hiring_signals: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub company_signals: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub recency: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            role_match: 0.30,
            tech_match: 0.25,
            hiring_signals: 0.20,
            company_signals: 0.15,
            recency: 0.10,
        }
    }
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.role_match + self.tech_match + self.hiring_signals + self.company_signals + self.recency
    }

    /// 权重之和必须为 1.0，不做自动归一化
    pub fn check_sum(&self) -> Result<(), LeadError> {
        let total = self.sum();
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(LeadError::ConfigurationError(format!(
                "scoring weights must sum to 1.0, got {:.6}",
                total
            )));
        }
        Ok(())
    }
}

/// 非短语类信号的固定分值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalPoints {
    pub active_listings: f64,
    pub careers_page: f64,
    pub remote: f64,
    pub contact_email: f64,
}

impl Default for SignalPoints {
    fn default() -> Self {
        Self {
            active_listings: 40.0,
            careers_page: 20.0,
            remote: 20.0,
            contact_email: 10.0,
        }
    }
}

/// 评分配置设置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScoringSettings {
    #[validate(nested)]
    pub weights: ScoringWeights,
    /// 高优先级下限（含）
    pub high_priority_score: f64,
    /// 中优先级下限（含）
    pub min_lead_score: f64,
    /// 在此天数内新鲜度为满分
    pub fresh_days: i64,
    /// 超过此天数新鲜度为 0
    pub stale_days: i64,
    /// 触发 score_change 的最小分差
    #[validate(range(min = 0.0))]
    pub score_change_threshold: f64,
    /// 技术匹配达到满分所需的权重之和
    #[validate(range(exclusive_min = 0.0))]
    pub tech_saturation_weight: f64,
    #[serde(default)]
    pub points: SignalPoints,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            high_priority_score: 70.0,
            min_lead_score: 40.0,
            fresh_days: 7,
            stale_days: 30,
            score_change_threshold: 10.0,
            tech_saturation_weight: 5.0,
            points: SignalPoints::default(),
        }
    }
}

/// 技术关键词（含别名）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechKeyword {
    /// 规范名称
    pub name: String,
    pub weight: f64,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// 目标职位模式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolePattern {
    pub pattern: String,
    pub weight: f64,
}

/// 职级倍数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeniorityLevel {
    pub pattern: String,
    pub multiplier: f64,
}

/// 信号类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalCategory {
    Hiring,
    Funding,
    Growth,
}

impl SignalCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalCategory::Hiring => "hiring",
            SignalCategory::Funding => "funding",
            SignalCategory::Growth => "growth",
        }
    }
}

/// 招聘信号短语
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRule {
    /// 展示名称，例如 "we're hiring"
    pub name: String,
    /// 正则表达式，匹配归一化后的文本
    pub pattern: String,
    pub category: SignalCategory,
    pub points: f64,
}

/// 远程办公指示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRule {
    pub label: String,
    pub pattern: String,
}

/// 联系邮箱过滤策略
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailPolicy {
    /// 只保留角色型邮箱（careers@、jobs@ 等）
    pub role_based_only: bool,
    pub prefer: Vec<String>,
    pub skip: Vec<String>,
    /// 非偏好邮箱最多保留几个
    pub max_other: usize,
}

impl Default for EmailPolicy {
    fn default() -> Self {
        Self {
            role_based_only: false,
            prefer: strings(&[
                "careers", "career", "jobs", "job", "hiring", "recruiting", "recruit", "talent",
                "people", "hr", "team",
            ]),
            skip: strings(&[
                "noreply", "no-reply", "support", "info", "sales", "marketing", "admin",
                "webmaster", "privacy", "legal",
            ]),
            max_other: 3,
        }
    }
}

/// 匹配表配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatcherSettings {
    pub tech_keywords: Vec<TechKeyword>,
    pub role_patterns: Vec<RolePattern>,
    pub seniority: Vec<SeniorityLevel>,
    pub hiring_signals: Vec<SignalRule>,
    pub remote_patterns: Vec<RemoteRule>,
    #[serde(default)]
    pub email: EmailPolicy,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        let tech = |name: &str, weight: f64, aliases: &[&str]| TechKeyword {
            name: name.to_string(),
            weight,
            aliases: strings(aliases),
        };
        let role = |pattern: &str, weight: f64| RolePattern {
            pattern: pattern.to_string(),
            weight,
        };
        let level = |pattern: &str, multiplier: f64| SeniorityLevel {
            pattern: pattern.to_string(),
            multiplier,
        };
        let signal = |name: &str, pattern: &str, category: SignalCategory, points: f64| SignalRule {
            name: name.to_string(),
            pattern: pattern.to_string(),
            category,
            points,
        };
        let remote = |label: &str, pattern: &str| RemoteRule {
            label: label.to_string(),
            pattern: pattern.to_string(),
        };

        Self {
            tech_keywords: vec![
                tech("python", 1.0, &["py"]),
                tech("sql", 1.0, &[]),
                tech("spark", 1.0, &["pyspark", "apache spark"]),
                tech("airflow", 1.0, &["apache airflow"]),
                tech("kafka", 0.9, &["apache kafka"]),
                tech("kubernetes", 0.8, &["k8s"]),
                tech("docker", 0.7, &[]),
                tech("aws", 0.9, &["amazon web services"]),
                tech("gcp", 0.9, &["google cloud"]),
                tech("pytorch", 1.0, &["torch"]),
                tech("tensorflow", 0.9, &["tf"]),
                tech("databricks", 1.0, &[]),
                tech("snowflake", 0.9, &[]),
                tech("dbt", 0.9, &[]),
                tech("go", 0.8, &["golang"]),
                tech("rust", 0.6, &[]),
                tech("java", 0.7, &[]),
            ],
            role_patterns: vec![
                role("data engineer", 1.0),
                role("backend engineer", 1.0),
                role("ml engineer", 1.0),
                role("machine learning engineer", 1.0),
                role("python developer", 0.9),
                role("data scientist", 0.8),
                role("software engineer", 0.7),
            ],
            seniority: vec![
                level("principal", 1.3),
                level("distinguished", 1.3),
                level("staff", 1.2),
                level("lead", 1.15),
                level("senior", 1.1),
                level("sr", 1.1),
                level("mid-level", 1.0),
                level("junior", 0.5),
                level("jr", 0.5),
            ],
            hiring_signals: vec![
                signal("we're hiring", r"we'?re\s+hiring|we\s+are\s+hiring", SignalCategory::Hiring, 30.0),
                signal("now hiring", r"now\s+hiring", SignalCategory::Hiring, 30.0),
                signal("join our team", r"join\s+our\s+team", SignalCategory::Hiring, 30.0),
                signal("open positions", r"open\s+positions?|current\s+openings?", SignalCategory::Hiring, 30.0),
                signal("career opportunities", r"career\s+opportunities", SignalCategory::Hiring, 30.0),
                signal("come work with us", r"come\s+work\s+with\s+us", SignalCategory::Hiring, 30.0),
                signal("series funding", r"series\s+[a-d]\b", SignalCategory::Funding, 40.0),
                signal("raised", r"raised\s+\$?\d+", SignalCategory::Funding, 40.0),
                signal("backed by", r"backed\s+by", SignalCategory::Funding, 40.0),
                signal("y combinator", r"y\s*combinator", SignalCategory::Funding, 40.0),
                signal("growing team", r"growing\s+(?:our\s+)?team", SignalCategory::Growth, 30.0),
                signal("expanding team", r"expanding\s+(?:our\s+)?team", SignalCategory::Growth, 30.0),
                signal("scaling", r"\bscaling\s+(?:up|fast|rapidly|our)\b", SignalCategory::Growth, 30.0),
            ],
            remote_patterns: vec![
                remote("remote", r"\bremote(?:[- ]first|[- ]friendly)?\b|\bfully\s+remote\b|\bwork\s+from\s+(?:home|anywhere)\b|\bdistributed\s+team\b"),
                remote("hybrid", r"\bhybrid\b|\bflexible\s+(?:work|location)\b"),
            ],
            email: EmailPolicy::default(),
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次叠加内置默认值、`config/default.yaml`、`config/{APP_ENVIRONMENT}.yaml`
    /// 以及 `LEADCRAWL__` 前缀的环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("LEADCRAWL").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// 从指定文件加载配置（叠加在内置默认值之上）
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::from(path))
            .add_source(Environment::with_prefix("LEADCRAWL").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// 校验配置
    ///
    /// 任何一项失败都会返回 `ConfigurationError`，调用方应在抓取前中止
    pub fn validate_all(&self) -> Result<(), LeadError> {
        self.validate()
            .map_err(|e| LeadError::ConfigurationError(e.to_string()))?;

        self.scoring.weights.check_sum()?;

        if self.rate_limiting.min_delay_ms > self.rate_limiting.max_delay_ms {
            return Err(LeadError::ConfigurationError(format!(
                "rate_limiting.min_delay_ms ({}) exceeds max_delay_ms ({})",
                self.rate_limiting.min_delay_ms, self.rate_limiting.max_delay_ms
            )));
        }
        if self.robots.fallback_crawl_delay_secs > self.robots.max_crawl_delay_secs as f64 {
            return Err(LeadError::ConfigurationError(format!(
                "robots.fallback_crawl_delay_secs ({}) exceeds max_crawl_delay_secs ({})",
                self.robots.fallback_crawl_delay_secs, self.robots.max_crawl_delay_secs
            )));
        }
        if self.scoring.stale_days <= self.scoring.fresh_days {
            return Err(LeadError::ConfigurationError(
                "scoring.stale_days must be greater than scoring.fresh_days".to_string(),
            ));
        }
        if self.scoring.min_lead_score > self.scoring.high_priority_score {
            return Err(LeadError::ConfigurationError(
                "scoring.min_lead_score must not exceed scoring.high_priority_score".to_string(),
            ));
        }
        if !matches!(self.crawler.scheme.as_str(), "http" | "https") {
            return Err(LeadError::ConfigurationError(format!(
                "unsupported crawler.scheme: {}",
                self.crawler.scheme
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
