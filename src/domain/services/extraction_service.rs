// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Node, Selector};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::warn;
use url::Url;

use crate::config::settings::{EmailPolicy, MatcherSettings, SignalCategory};
use crate::domain::models::page::{PageRecord, PageType};
use crate::utils::errors::LeadError;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}").unwrap());

/// 职位名称中常见的角色名词
static ROLE_NOUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:engineer|developer|scientist|analyst|architect)s?\b").unwrap());

static CAREERS_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/(?:careers?|jobs?|hiring|work-with-us|join-us|join)(?:/|$|[-_.?#])").unwrap()
});

static LISTING_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/(?:openings?|positions?|opportunities|vacanc(?:y|ies)|postings?|roles?)(?:/|$|[-_.?#])")
        .unwrap()
});

static ABOUT_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(?:about|team|company|our-team|people)(?:/|$|[-_.?#])").unwrap());

static CAREERS_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:careers?|jobs|join our team|we'?re hiring|work with us)\b").unwrap());

static ABOUT_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:about us|our team|meet the team|our story)\b").unwrap());

/// 页面正文中表示招聘页的短语，命中两个及以上视为招聘页
static CAREERS_CONTENT: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"open\s+positions?",
        r"current\s+openings?",
        r"job\s+openings?",
        r"career\s+opportunities",
        r"we'?re\s+hiring",
        r"join\s+our\s+team",
        r"apply\s+now",
        r"view\s+all\s+jobs",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static IMAGE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.(?:png|jpe?g|gif|svg|webp)$").unwrap());

static SEL_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static SEL_HEADINGS: Lazy<Selector> = Lazy::new(|| Selector::parse("h1, h2").unwrap());
static SEL_TITLE_CANDIDATES: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1, h2, h3, h4, a, li").unwrap());
static SEL_JSON_LD: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());
static SEL_APPLY: Lazy<Selector> = Lazy::new(|| Selector::parse("a, button").unwrap());
static SEL_LISTING_CONTAINERS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"div[class*="job"], div[class*="position"], div[class*="opening"], li[class*="job"]"#)
        .unwrap()
});
static SEL_MAILTO: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"a[href^="mailto:"]"#).unwrap());

/// 职位名称的合理长度
const TITLE_MIN_LEN: usize = 10;
const TITLE_MAX_LEN: usize = 100;

struct CompiledTech {
    name: String,
    weight: f64,
    pattern: Regex,
}

struct CompiledRole {
    name: String,
    weight: f64,
    pattern: Regex,
}

struct CompiledLevel {
    multiplier: f64,
    pattern: Regex,
}

struct CompiledSignal {
    name: String,
    category: SignalCategory,
    points: f64,
    pattern: Regex,
}

/// 编译后的匹配表
///
/// 启动时从配置构建一次，之后只读；提取和评分共享同一份
pub struct SignalMatchers {
    tech: Vec<CompiledTech>,
    roles: Vec<CompiledRole>,
    levels: Vec<CompiledLevel>,
    signals: Vec<CompiledSignal>,
    remote: Vec<(String, Regex)>,
    email: EmailPolicy,
}

/// 用自定义边界包裹的备选短语，`c++`、`c#` 这类关键词也能正确分词
fn keyword_regex(phrases: &[String]) -> Result<Regex, regex::Error> {
    let alternatives = phrases
        .iter()
        .map(|p| regex::escape(&p.to_lowercase()))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?:^|[^a-z0-9+#])(?:{})(?:$|[^a-z0-9+#])", alternatives))
}

fn invalid_pattern(what: &str, name: &str, e: regex::Error) -> LeadError {
    LeadError::ConfigurationError(format!("invalid {} pattern '{}': {}", what, name, e))
}

impl SignalMatchers {
    /// 编译匹配表
    ///
    /// # 返回值
    ///
    /// * `Ok(SignalMatchers)` - 编译成功
    /// * `Err(LeadError::ConfigurationError)` - 某个模式无法编译
    pub fn compile(settings: &MatcherSettings) -> Result<Self, LeadError> {
        let tech = settings
            .tech_keywords
            .iter()
            .map(|t| {
                let mut phrases = vec![t.name.clone()];
                phrases.extend(t.aliases.iter().cloned());
                Ok(CompiledTech {
                    name: t.name.to_lowercase(),
                    weight: t.weight,
                    pattern: keyword_regex(&phrases)
                        .map_err(|e| invalid_pattern("tech keyword", &t.name, e))?,
                })
            })
            .collect::<Result<Vec<_>, LeadError>>()?;

        let roles = settings
            .role_patterns
            .iter()
            .map(|r| {
                let phrase = WHITESPACE.replace_all(&r.pattern.to_lowercase(), " ").to_string();
                let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(&phrase).replace(' ', r"\s+")))
                    .map_err(|e| invalid_pattern("role", &r.pattern, e))?;
                Ok(CompiledRole {
                    name: phrase,
                    weight: r.weight,
                    pattern,
                })
            })
            .collect::<Result<Vec<_>, LeadError>>()?;

        let mut levels = settings
            .seniority
            .iter()
            .map(|l| {
                Ok(CompiledLevel {
                    multiplier: l.multiplier,
                    pattern: Regex::new(&format!(r"\b{}\b\.?", regex::escape(&l.pattern.to_lowercase())))
                        .map_err(|e| invalid_pattern("seniority", &l.pattern, e))?,
                })
            })
            .collect::<Result<Vec<_>, LeadError>>()?;
        // Highest level wins when a title mentions several
        levels.sort_by(|a, b| b.multiplier.total_cmp(&a.multiplier));

        let signals = settings
            .hiring_signals
            .iter()
            .map(|s| {
                Ok(CompiledSignal {
                    name: s.name.to_lowercase(),
                    category: s.category,
                    points: s.points,
                    pattern: Regex::new(&s.pattern)
                        .map_err(|e| invalid_pattern("signal", &s.name, e))?,
                })
            })
            .collect::<Result<Vec<_>, LeadError>>()?;

        let remote = settings
            .remote_patterns
            .iter()
            .map(|r| {
                Regex::new(&r.pattern)
                    .map(|re| (r.label.to_lowercase(), re))
                    .map_err(|e| invalid_pattern("remote", &r.label, e))
            })
            .collect::<Result<Vec<_>, LeadError>>()?;

        Ok(Self {
            tech,
            roles,
            levels,
            signals,
            remote,
            email: settings.email.clone(),
        })
    }

    /// 规范化技术关键词的权重
    pub fn tech_weight(&self, name: &str) -> Option<f64> {
        self.tech.iter().find(|t| t.name == name).map(|t| t.weight)
    }

    /// 职位名称匹配到的最佳目标职位
    ///
    /// # 返回值
    ///
    /// `(职位模式, 职位权重 × 职级倍数)`，未匹配任何目标职位时为 `None`
    pub fn best_role_match(&self, title: &str) -> Option<(String, f64)> {
        let normalized = normalize_text(title);
        let multiplier = self.seniority_multiplier(&normalized);
        self.roles
            .iter()
            .filter(|r| r.pattern.is_match(&normalized))
            .map(|r| (r.name.clone(), r.weight * multiplier))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// 职级倍数，未出现任何职级词时为 1.0
    pub fn seniority_multiplier(&self, normalized_title: &str) -> f64 {
        self.levels
            .iter()
            .find(|l| l.pattern.is_match(normalized_title))
            .map(|l| l.multiplier)
            .unwrap_or(1.0)
    }

    /// 根据 `category:name` 形式的信号查找类别和分值
    pub fn signal_points(&self, entry: &str) -> Option<(SignalCategory, f64)> {
        let (category, name) = entry.split_once(':')?;
        self.signals
            .iter()
            .find(|s| s.category.as_str() == category && s.name == name)
            .map(|s| (s.category, s.points))
    }

    fn match_tech(&self, text: &str) -> Vec<String> {
        self.tech
            .iter()
            .filter(|t| t.pattern.is_match(text))
            .map(|t| t.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn match_signals(&self, text: &str) -> Vec<String> {
        self.signals
            .iter()
            .filter(|s| s.pattern.is_match(text))
            .map(|s| format!("{}:{}", s.category.as_str(), s.name))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn match_remote(&self, text: &str) -> Vec<String> {
        self.remote
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(label, _)| label.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn is_role_title(&self, normalized: &str) -> bool {
        ROLE_NOUN.is_match(normalized) || self.roles.iter().any(|r| r.pattern.is_match(normalized))
    }

    fn filter_emails(&self, candidates: BTreeSet<String>) -> Vec<String> {
        let has_token = |local: &str, tokens: &[String]| {
            local
                .split(['.', '-', '_', '+'])
                .chain(std::iter::once(local))
                .any(|part| tokens.iter().any(|t| t == part))
        };

        let mut preferred = Vec::new();
        let mut other = Vec::new();
        for email in candidates {
            let Some((local, host)) = email.split_once('@') else {
                continue;
            };
            if IMAGE_SUFFIX.is_match(host) || has_token(local, &self.email.skip) {
                continue;
            }
            if has_token(local, &self.email.prefer) {
                preferred.push(email);
            } else {
                other.push(email);
            }
        }

        if !self.email.role_based_only {
            other.truncate(self.email.max_other);
            preferred.extend(other);
        }
        preferred
    }
}

/// 归一化文本：小写并合并空白
pub fn normalize_text(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").to_lowercase()
}

/// 内容指纹：归一化文本的 sha256 十六进制串
pub fn fingerprint(normalized: &str) -> String {
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// 页面中可见的文本，跳过 script/style/noscript
fn visible_text(document: &Html) -> String {
    let mut out = String::new();
    for node in document.tree.nodes() {
        if let Node::Text(text) = node.value() {
            let hidden = node
                .parent()
                .and_then(|p| p.value().as_element().map(|e| e.name().to_string()))
                .is_some_and(|name| matches!(name.as_str(), "script" | "style" | "noscript" | "template"));
            if !hidden {
                out.push_str(text);
                out.push(' ');
            }
        }
    }
    out
}

fn element_text(element: scraper::ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

/// JSON-LD 中 `JobPosting` 的标题
fn json_ld_job_titles(document: &Html) -> Vec<String> {
    fn collect(value: &Value, out: &mut Vec<String>) {
        match value {
            Value::Array(items) => items.iter().for_each(|v| collect(v, out)),
            Value::Object(map) => {
                let is_posting = match map.get("@type") {
                    Some(Value::String(t)) => t == "JobPosting",
                    Some(Value::Array(types)) => types.iter().any(|t| t == "JobPosting"),
                    _ => false,
                };
                if is_posting {
                    if let Some(Value::String(title)) = map.get("title") {
                        let title = title.trim();
                        if !title.is_empty() {
                            out.push(title.to_string());
                        }
                    }
                }
                if let Some(graph) = map.get("@graph") {
                    collect(graph, out);
                }
            }
            _ => {}
        }
    }

    let mut titles = Vec::new();
    for script in document.select(&SEL_JSON_LD) {
        match serde_json::from_str::<Value>(&element_text(script)) {
            Ok(value) => collect(&value, &mut titles),
            Err(e) => tracing::debug!("Skipping malformed JSON-LD block: {}", e),
        }
    }
    titles
}

/// 页面分类器
///
/// 基于URL路径和标题/标题元素的规则分类；多个类型同时命中时按优先级取值
pub struct PageClassifier;

impl PageClassifier {
    /// 对页面分类
    ///
    /// # 参数
    ///
    /// * `url` - 页面URL
    /// * `headings` - 归一化后的 `<title>`、`h1`、`h2` 文本
    /// * `text` - 归一化后的正文
    /// * `has_structured_postings` - 页面是否带有 JobPosting 结构化数据
    pub fn classify(url: &Url, headings: &[String], text: &str, has_structured_postings: bool) -> PageType {
        let path = url.path().to_lowercase();
        let mut candidates = Vec::new();

        let careers_phrases = CAREERS_CONTENT.iter().filter(|re| re.is_match(text)).count();
        if CAREERS_PATH.is_match(&path)
            || headings.iter().any(|h| CAREERS_HEADING.is_match(h))
            || careers_phrases >= 2
        {
            candidates.push(PageType::Careers);
        }
        if LISTING_PATH.is_match(&path) || has_structured_postings {
            candidates.push(PageType::JobListing);
        }
        if ABOUT_PATH.is_match(&path) || headings.iter().any(|h| ABOUT_HEADING.is_match(h)) {
            candidates.push(PageType::AboutTeam);
        }

        candidates.into_iter().min().unwrap_or(PageType::Other)
    }
}

/// 信号提取器
///
/// 从页面内容中提取职位、技术关键词、招聘信号、远程指示和联系邮箱。
/// 纯函数：不做任何IO，失败时退化为空记录。
#[derive(Clone)]
pub struct SignalExtractor {
    matchers: Arc<SignalMatchers>,
}

impl SignalExtractor {
    pub fn new(matchers: Arc<SignalMatchers>) -> Self {
        Self { matchers }
    }

    pub fn matchers(&self) -> &Arc<SignalMatchers> {
        &self.matchers
    }

    /// 分类并提取页面信号
    ///
    /// 不会失败：内容异常时返回空但合法的页面记录
    ///
    /// # 参数
    ///
    /// * `url` - 页面URL
    /// * `domain` - 所属域名
    /// * `html` - 页面内容
    /// * `fetched_at` - 抓取时间
    pub fn classify_and_extract(
        &self,
        url: &str,
        domain: &str,
        html: &str,
        fetched_at: DateTime<Utc>,
    ) -> PageRecord {
        match self.extract(url, domain, html, fetched_at) {
            Ok(record) => record,
            Err(e) => {
                warn!(url = %url, error = %e, "Extraction failed, emitting empty page record");
                PageRecord::empty(url, domain, fetched_at)
            }
        }
    }

    /// 提取页面信号，内容无法处理时返回 `ExtractionError`
    pub fn extract(
        &self,
        url: &str,
        domain: &str,
        html: &str,
        fetched_at: DateTime<Utc>,
    ) -> Result<PageRecord, LeadError> {
        let parsed_url = Url::parse(url)
            .map_err(|e| LeadError::ExtractionError(format!("invalid url {}: {}", url, e)))?;
        if html.contains('\0') {
            return Err(LeadError::ExtractionError(format!(
                "{} returned binary content",
                url
            )));
        }

        let document = Html::parse_document(html);
        let text = normalize_text(&visible_text(&document));

        let title = document
            .select(&SEL_TITLE)
            .next()
            .map(|t| WHITESPACE.replace_all(element_text(t).trim(), " ").to_string())
            .filter(|t| !t.is_empty());

        let mut headings: Vec<String> = title.iter().map(|t| normalize_text(t)).collect();
        headings.extend(
            document
                .select(&SEL_HEADINGS)
                .map(|h| normalize_text(&element_text(h))),
        );

        let structured = json_ld_job_titles(&document);
        let job_titles = self.job_titles(&document, &structured);

        let emails = {
            let mut candidates: BTreeSet<String> = EMAIL
                .find_iter(&text)
                .map(|m| m.as_str().trim_end_matches('.').to_string())
                .collect();
            for link in document.select(&SEL_MAILTO) {
                if let Some(href) = link.value().attr("href") {
                    let address = href.trim_start_matches("mailto:");
                    let address = address.split('?').next().unwrap_or(address).trim().to_lowercase();
                    if EMAIL.is_match(&address) {
                        candidates.insert(address);
                    }
                }
            }
            self.matchers.filter_emails(candidates)
        };

        let has_apply_button = document
            .select(&SEL_APPLY)
            .any(|e| normalize_text(&element_text(e)).contains("apply"));
        let has_job_listings =
            job_titles.len() > 1 || document.select(&SEL_LISTING_CONTAINERS).next().is_some();

        let page_type =
            PageClassifier::classify(&parsed_url, &headings, &text, !structured.is_empty());

        Ok(PageRecord {
            id: uuid::Uuid::new_v4(),
            url: url.to_string(),
            domain: domain.to_string(),
            page_type,
            fingerprint: fingerprint(&text),
            title,
            job_titles,
            tech_keywords: self.matchers.match_tech(&text),
            hiring_signals: self.matchers.match_signals(&text),
            remote_indicators: self.matchers.match_remote(&text),
            emails,
            has_apply_button,
            has_job_listings,
            fetched_at,
        })
    }

    /// 职位名称：标题/链接/列表项中形似职位的文本，加上 JSON-LD 职位
    ///
    /// 大小写不敏感去重，结果按字母排序
    fn job_titles(&self, document: &Html, structured: &[String]) -> Vec<String> {
        let mut titles: BTreeMap<String, String> = BTreeMap::new();

        for element in document.select(&SEL_TITLE_CANDIDATES) {
            let normalized = normalize_text(&element_text(element));
            let len = normalized.chars().count();
            if !(TITLE_MIN_LEN..=TITLE_MAX_LEN).contains(&len) {
                continue;
            }
            if self.matchers.is_role_title(&normalized) {
                titles
                    .entry(normalized.clone())
                    .or_insert_with(|| title_case(&normalized));
            }
        }

        for title in structured {
            let display = WHITESPACE.replace_all(title, " ").to_string();
            titles.entry(normalize_text(&display)).or_insert(display);
        }

        titles.into_values().collect()
    }
}

#[cfg(test)]
#[path = "extraction_service_test.rs"]
mod tests;
