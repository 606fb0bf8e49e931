// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use url::{ParseError, Url};

/// 将可能为相对路径的URL转换为绝对路径URL
pub fn resolve_url(base_url: &Url, path: &str) -> Result<Url, ParseError> {
    base_url.join(path)
}

/// 归一化域名
///
/// 接受裸域名或完整URL，返回小写、去掉 `www.` 前缀的主机名；
/// 端口仅在非默认时保留（例如 `127.0.0.1:8080`）
///
/// # 参数
///
/// * `input` - 域名或URL
///
/// # 返回值
///
/// * `Some(String)` - 归一化后的域名
/// * `None` - 无法解析出主机名
pub fn normalize_domain(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&with_scheme).ok()?;
    domain_of(&url)
}

/// 从已解析的URL中提取归一化域名
pub fn domain_of(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    if host.is_empty() {
        return None;
    }

    // port() returns None when the port is the scheme default
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

/// 判断URL是否属于指定域名
///
/// 只接受同一主机（忽略 `www.` 前缀）。子域名有各自的 robots.txt，
/// 而 robots 检查按爬取域名进行，因此子域名不算同一域名
pub fn is_same_domain(url: &Url, domain: &str) -> bool {
    domain_of(url).is_some_and(|d| d == domain)
}

/// 判断域名是否命中黑名单
///
/// 精确匹配或作为黑名单条目的子域名匹配，例如 `jobs.blocked.com` 命中 `blocked.com`
pub fn is_blocklisted(domain: &str, blocklist: &[String]) -> bool {
    let Some(domain) = normalize_domain(domain) else {
        return false;
    };
    blocklist.iter().filter_map(|entry| normalize_domain(entry)).any(|entry| {
        domain == entry || domain.ends_with(&format!(".{}", entry))
    })
}

/// 解析命令行或文件中的目标
///
/// 裸域名只给出域名；完整URL同时作为起始URL
///
/// # 返回值
///
/// * `Some((domain, start_url))` - 解析成功
/// * `None` - 无法解析出主机名或协议不是 http/https
pub fn parse_target(input: &str) -> Option<(String, Option<String>)> {
    let trimmed = input.trim();
    if !trimmed.contains("://") {
        return normalize_domain(trimmed).map(|domain| (domain, None));
    }
    let mut url = Url::parse(trimmed).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    let domain = domain_of(&url)?;
    Some((domain, Some(url.to_string())))
}

/// 拼接某个域名的根URL
pub fn domain_root_url(scheme: &str, domain: &str) -> String {
    format!("{}://{}", scheme, domain)
}
