// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::Utc;
use leadcrawl::config::settings::Settings;
use leadcrawl::domain::models::lead_domain::{DomainStatus, LeadDomain};
use leadcrawl::domain::repositories::page_repository::PageRepository;
use leadcrawl::domain::services::crawl_service::CrawlOutcome;
use leadcrawl::engines::reqwest_engine::ReqwestFetcher;
use leadcrawl::infrastructure::repositories::memory::InMemoryStore;
use leadcrawl::workers::CrawlWorker;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_settings() -> Settings {
    let mut settings = Settings::default();
    settings.crawler.scheme = "http".to_string();
    settings.rate_limiting.min_delay_ms = 10;
    settings.rate_limiting.max_delay_ms = 50;
    settings
}

#[tokio::test]
async fn test_worker_crawls_local_site_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/careers"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><head><title>Acme | Careers</title></head><body>\
             <h1>We're hiring</h1>\
             <ul><li><a href=\"/jobs/data-engineer\">Senior Data Engineer</a></li></ul>\
             <a href=\"/private/jobs\">Internal jobs</a>\
             <p>Python and Spark.</p></body></html>",
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jobs/data-engineer"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><head><title>Senior Data Engineer | Acme</title></head>\
             <body><h1>Senior Data Engineer</h1><button>Apply now</button></body></html>",
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private/jobs"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let domain = server.address().to_string();
    let store = Arc::new(InMemoryStore::new());
    let worker = CrawlWorker::from_settings(
        &fast_settings(),
        Arc::new(ReqwestFetcher::new()),
        store.clone(),
        store.clone(),
        store.clone(),
    )
    .unwrap();

    let lead = LeadDomain::new(domain.clone(), None, Utc::now())
        .with_start_url(format!("{}/careers", server.uri()));
    let summary = worker.process(lead, &CancellationToken::new()).await.unwrap();

    assert_eq!(summary.outcome, CrawlOutcome::Completed);
    assert_eq!(summary.status, DomainStatus::Scraped);
    assert_eq!(summary.pages, 2);
    assert_eq!(summary.skipped_by_policy, 1);
    assert!(summary.score.is_some());

    let pages = store.find_by_domain(&domain).await.unwrap();
    assert_eq!(pages.len(), 2);
    assert!(pages.iter().all(|p| p.domain == domain));
}
