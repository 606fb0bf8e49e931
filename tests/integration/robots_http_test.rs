// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use leadcrawl::config::settings::RobotsSettings;
use leadcrawl::engines::reqwest_engine::ReqwestFetcher;
use leadcrawl::engines::traits::{FetchError, FetchRequest, Fetcher};
use leadcrawl::utils::robots::{Confidence, PolicyBasis, RobotsPolicyCache};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER_AGENT: &str = "LeadCrawlBot/1.0";

/// 以 `host:port` 作为域名，对本地服务构造 robots 缓存
fn robots_cache(server: &MockServer) -> (RobotsPolicyCache, String) {
    let domain = server.address().to_string();
    let cache = RobotsPolicyCache::new(
        Arc::new(ReqwestFetcher::new()),
        RobotsSettings::default(),
        USER_AGENT,
        "http",
    );
    (cache, domain)
}

#[tokio::test]
async fn test_robots_fetched_once_for_concurrent_checks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("User-agent: *\nDisallow: /admin\nCrawl-delay: 7\n"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (cache, domain) = robots_cache(&server);
    let cache = Arc::new(cache);

    let mut handles = Vec::new();
    for p in ["/careers", "/admin/users", "/jobs", "/"] {
        let cache = cache.clone();
        let domain = domain.clone();
        handles.push(tokio::spawn(async move {
            (p, cache.check_allowed(&domain, p).await)
        }));
    }

    for handle in handles {
        let (p, decision) = handle.await.unwrap();
        assert_eq!(decision.basis, PolicyBasis::Explicit);
        assert_eq!(decision.crawl_delay, Some(Duration::from_secs(7)));
        assert!(!decision.site_wide_deny);
        assert_eq!(decision.allowed, !p.starts_with("/admin"), "path {}", p);
    }
}

#[tokio::test]
async fn test_missing_robots_uses_conservative_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let (cache, domain) = robots_cache(&server);
    let decision = cache.check_allowed(&domain, "/careers").await;

    assert!(decision.allowed);
    assert_eq!(decision.basis, PolicyBasis::FallbackPermissive);
    assert_eq!(decision.crawl_delay, Some(Duration::from_secs(5)));

    let status = cache.status(&domain).await.unwrap();
    assert_eq!(status.confidence, Confidence::Normal);
}

#[tokio::test]
async fn test_server_error_is_low_confidence() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (cache, domain) = robots_cache(&server);
    let decision = cache.check_allowed(&domain, "/careers").await;
    assert!(decision.allowed);
    assert_eq!(decision.basis, PolicyBasis::FallbackPermissive);

    let status = cache.status(&domain).await.unwrap();
    assert_eq!(status.confidence, Confidence::Low);
    assert!(status.expires_in <= Duration::from_secs(RobotsSettings::default().low_confidence_ttl_secs));
}

#[tokio::test]
async fn test_site_wide_deny_for_our_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("User-agent: LeadCrawlBot\nDisallow: /\n\nUser-agent: *\nAllow: /\n"),
        )
        .mount(&server)
        .await;

    let (cache, domain) = robots_cache(&server);
    let decision = cache.check_allowed(&domain, "/careers").await;
    assert!(!decision.allowed);
    assert!(decision.site_wide_deny);
}

#[tokio::test]
async fn test_slow_page_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/careers"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new();
    let request = FetchRequest::get(
        format!("{}/careers", server.uri()),
        USER_AGENT,
        Duration::from_millis(200),
    );
    let result = fetcher.fetch(&request).await;
    assert!(matches!(result, Err(FetchError::Timeout)));
}
