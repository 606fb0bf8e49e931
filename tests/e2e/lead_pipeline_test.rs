// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{build_worker, ScriptedFetcher};
use chrono::Utc;
use leadcrawl::config::settings::Settings;
use leadcrawl::domain::models::change::ChangeKind;
use leadcrawl::domain::models::lead_domain::{DomainStatus, LeadDomain};
use leadcrawl::domain::repositories::domain_repository::DomainRepository;
use leadcrawl::domain::repositories::lead_repository::LeadRepository;
use leadcrawl::domain::repositories::page_repository::PageRepository;
use leadcrawl::domain::services::crawl_service::CrawlOutcome;
use leadcrawl::domain::models::score::Priority;
use leadcrawl::engines::traits::FetchError;
use leadcrawl::workers::WorkerManager;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn careers_page(titles: &[&str]) -> String {
    let items: String = titles
        .iter()
        .map(|t| format!("<li>{}</li>", t))
        .collect();
    format!(
        "<html><head><title>Acme | Careers</title></head><body>\
         <h1>We're hiring</h1><ul>{}</ul>\
         <p>Our stack is Python and Spark.</p></body></html>",
        items
    )
}

fn target(domain: &str, start_url: Option<&str>) -> LeadDomain {
    let lead = LeadDomain::new(domain, Some("data".to_string()), Utc::now());
    match start_url {
        Some(url) => lead.with_start_url(url),
        None => lead,
    }
}

#[tokio::test(start_paused = true)]
async fn test_careers_page_produces_medium_lead() {
    let fetcher = ScriptedFetcher::new();
    fetcher.page("https://acme.io/robots.txt", "User-agent: *\nAllow: /careers");
    fetcher.page(
        "https://acme.io/careers",
        &careers_page(&["Senior Data Engineer"]),
    );
    let (worker, store) = build_worker(&Settings::default(), fetcher.clone());

    let summary = worker
        .process(
            target("acme.io", Some("https://acme.io/careers")),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(summary.outcome, CrawlOutcome::Completed);
    assert_eq!(summary.pages, 1);
    assert_eq!(summary.status, DomainStatus::Scraped);
    assert_eq!(summary.priority, Some(Priority::Medium));
    assert!((summary.score.unwrap() - 60.0).abs() < 1e-6);

    let score = store.latest_score("acme.io").await.unwrap().unwrap();
    assert_eq!(score.components.role_match, 100.0);
    assert_eq!(score.components.hiring_signals, 50.0);
    assert_eq!(score.matched_tech, vec!["python", "spark"]);

    let profile = store.latest_profile("acme.io").await.unwrap().unwrap();
    assert_eq!(profile.name.as_deref(), Some("Acme"));

    // First run: every listing is new
    assert_eq!(summary.changes.len(), 1);
    assert_eq!(summary.changes[0].kind, ChangeKind::NewListing);
    assert_eq!(
        summary.changes[0].new_value.as_deref(),
        Some("Senior Data Engineer")
    );

    let domain = store.find("acme.io").await.unwrap().unwrap();
    assert!(domain.last_robots_check.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_disallowed_careers_path_is_never_fetched() {
    let fetcher = ScriptedFetcher::new();
    fetcher.page(
        "https://beta.io/robots.txt",
        "User-agent: *\nDisallow: /careers",
    );
    fetcher.page(
        "https://beta.io/careers",
        &careers_page(&["Senior Data Engineer"]),
    );
    let (worker, store) = build_worker(&Settings::default(), fetcher.clone());

    let summary = worker
        .process(
            target("beta.io", Some("https://beta.io/careers")),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(summary.pages, 0);
    assert_eq!(summary.skipped_by_policy, 1);
    assert_eq!(summary.status, DomainStatus::Pending);
    assert!(summary.score.is_none());
    assert!(summary.changes.is_empty());
    assert_eq!(fetcher.urls(), vec!["https://beta.io/robots.txt"]);
    assert!(store.find_by_domain("beta.io").await.unwrap().is_empty());
    assert!(store.changes_for("beta.io").await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_timeouts_back_off_then_abandon_domain() {
    let fetcher = ScriptedFetcher::new();
    fetcher.status("https://foo.com/robots.txt", 404);
    fetcher.fail("https://foo.com/", FetchError::Timeout);
    for path in ["careers", "jobs", "join-us", "work-with-us", "about/careers", "company/careers"] {
        fetcher.fail(&format!("https://foo.com/{}", path), FetchError::Timeout);
    }

    let mut settings = Settings::default();
    settings.crawler.probe_careers_paths = true;
    let (worker, store) = build_worker(&settings, fetcher.clone());

    let summary = worker
        .process(target("foo.com", None), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.outcome, CrawlOutcome::Abandoned);
    assert_eq!(summary.attempts, 3);
    assert_eq!(summary.pages, 0);
    assert_eq!(summary.status, DomainStatus::Error);

    let times = fetcher.times_for("https://foo.com/");
    assert_eq!(times.len(), 3);
    assert!(times[1] - times[0] >= Duration::from_secs(10));
    assert!(times[2] - times[1] >= Duration::from_secs(20));

    let domain = store.find("foo.com").await.unwrap().unwrap();
    assert_eq!(domain.status, DomainStatus::Error);
    assert_eq!(domain.crawl_delay_secs, Some(5.0));
}

#[tokio::test(start_paused = true)]
async fn test_blocklisted_domain_is_never_fetched() {
    let fetcher = ScriptedFetcher::new();
    let mut settings = Settings::default();
    settings.blocklist = vec!["evil.io".to_string()];
    let (worker, store) = build_worker(&settings, fetcher.clone());
    let cancel = CancellationToken::new();

    let first = worker.process(target("evil.io", None), &cancel).await.unwrap();
    assert_eq!(first.outcome, CrawlOutcome::Blocked);
    assert_eq!(first.status, DomainStatus::Blocked);

    let second = worker.process(target("evil.io", None), &cancel).await.unwrap();
    assert_eq!(second.outcome, CrawlOutcome::Blocked);

    assert!(fetcher.urls().is_empty());
    let domain = store.find("evil.io").await.unwrap().unwrap();
    assert_eq!(domain.blocked_reason.as_deref(), Some("blocklist"));
}

#[tokio::test(start_paused = true)]
async fn test_site_wide_deny_blocks_domain_for_later_runs() {
    let fetcher = ScriptedFetcher::new();
    fetcher.page("https://closed.io/robots.txt", "User-agent: *\nDisallow: /");
    let (worker, store) = build_worker(&Settings::default(), fetcher.clone());
    let cancel = CancellationToken::new();

    let first = worker.process(target("closed.io", None), &cancel).await.unwrap();
    assert_eq!(first.outcome, CrawlOutcome::Blocked);
    assert_eq!(first.status, DomainStatus::Blocked);

    let second = worker.process(target("closed.io", None), &cancel).await.unwrap();
    assert_eq!(second.outcome, CrawlOutcome::Blocked);
    assert_eq!(fetcher.urls(), vec!["https://closed.io/robots.txt"]);

    let domain = store.find("closed.io").await.unwrap().unwrap();
    assert!(domain.is_blocked());
}

#[tokio::test(start_paused = true)]
async fn test_second_run_reports_listing_changes() {
    let fetcher = ScriptedFetcher::new();
    fetcher.page("https://acme.io/robots.txt", "User-agent: *\nAllow: /");
    fetcher.page(
        "https://acme.io/careers",
        &careers_page(&["Senior Data Engineer", "Platform Analyst"]),
    );
    let (worker, store) = build_worker(&Settings::default(), fetcher.clone());
    let cancel = CancellationToken::new();

    let first = worker
        .process(target("acme.io", Some("https://acme.io/careers")), &cancel)
        .await
        .unwrap();
    assert_eq!(first.changes.len(), 2);

    fetcher.page(
        "https://acme.io/careers",
        &careers_page(&["Senior Data Engineer", "Backend Engineer"]),
    );
    let second = worker
        .process(target("acme.io", Some("https://acme.io/careers")), &cancel)
        .await
        .unwrap();

    let kinds: Vec<ChangeKind> = second.changes.iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ChangeKind::NewListing,
            ChangeKind::RemovedListing,
            ChangeKind::ContentChange
        ]
    );
    assert_eq!(second.changes[0].new_value.as_deref(), Some("Backend Engineer"));
    assert_eq!(second.changes[1].old_value.as_deref(), Some("Platform Analyst"));
    assert_eq!(
        second.changes[2].url.as_deref(),
        Some("https://acme.io/careers")
    );

    assert_eq!(store.score_history("acme.io").await.unwrap().len(), 2);
    assert_eq!(store.find_by_domain("acme.io").await.unwrap().len(), 2);
    assert_eq!(store.changes_for("acme.io").await.unwrap().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_manager_keeps_input_order_across_domains() {
    let fetcher = ScriptedFetcher::new();
    fetcher.page("https://acme.io/robots.txt", "User-agent: *\nAllow: /");
    fetcher.page(
        "https://acme.io/careers",
        &careers_page(&["Senior Data Engineer"]),
    );
    fetcher.page("https://beta.io/robots.txt", "User-agent: *\nDisallow: /careers");
    fetcher.page("https://closed.io/robots.txt", "User-agent: *\nDisallow: /");

    let mut settings = Settings::default();
    settings.blocklist = vec!["evil.io".to_string()];
    let (worker, _store) = build_worker(&settings, fetcher.clone());
    let manager = WorkerManager::new(worker, 2);

    let summaries = manager
        .run(vec![
            target("closed.io", None),
            target("acme.io", Some("https://acme.io/careers")),
            target("evil.io", None),
            target("beta.io", Some("https://beta.io/careers")),
        ])
        .await;

    let domains: Vec<&str> = summaries.iter().map(|s| s.domain.as_str()).collect();
    assert_eq!(domains, vec!["closed.io", "acme.io", "evil.io", "beta.io"]);
    assert_eq!(summaries[0].status, DomainStatus::Blocked);
    assert_eq!(summaries[1].status, DomainStatus::Scraped);
    assert_eq!(summaries[2].outcome, CrawlOutcome::Blocked);
    assert_eq!(summaries[3].status, DomainStatus::Pending);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_run_fetches_nothing() {
    let fetcher = ScriptedFetcher::new();
    fetcher.page("https://acme.io/robots.txt", "User-agent: *\nAllow: /");
    let (worker, _store) = build_worker(&Settings::default(), fetcher.clone());
    let manager = WorkerManager::new(worker, 1);
    manager.cancel_token().cancel();

    let summaries = manager.run(vec![target("acme.io", None)]).await;

    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].outcome, CrawlOutcome::Cancelled);
    assert_eq!(summaries[0].pages, 0);
    assert!(fetcher.urls().iter().all(|u| u.ends_with("/robots.txt")));
}
