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

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use leadcrawl::config::settings::Settings;
use leadcrawl::domain::models::lead_domain::LeadDomain;
use leadcrawl::engines::reqwest_engine::ReqwestFetcher;
use leadcrawl::infrastructure::observability::metrics::describe_metrics;
use leadcrawl::infrastructure::repositories::memory::InMemoryStore;
use leadcrawl::utils::telemetry;
use leadcrawl::utils::url_utils::parse_target;
use leadcrawl::workers::{CrawlWorker, WorkerManager};
use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "leadcrawl")]
#[command(about = "Polite lead discovery crawler: fetch careers pages, score companies, report changes")]
struct Cli {
    /// Domains or start URLs to crawl
    targets: Vec<String>,

    /// File with one domain or URL per line (`#` starts a comment)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Configuration file layered over the built-in defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Discovery category recorded on new domains
    #[arg(long)]
    category: Option<String>,

    /// Override crawler.max_pages_per_domain
    #[arg(long)]
    max_pages: Option<usize>,

    /// Override crawler.workers
    #[arg(long)]
    workers: Option<usize>,
}

/// 主函数
///
/// 加载并校验配置，处理全部目标域名，并以 JSON 行输出每个域名的结果
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    describe_metrics();
    let cli = Cli::parse();

    // 2. Load configuration
    let mut settings = match &cli.config {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => Settings::new().context("failed to load configuration")?,
    };
    if let Some(max_pages) = cli.max_pages {
        settings.crawler.max_pages_per_domain = max_pages;
    }
    if let Some(workers) = cli.workers {
        settings.crawler.workers = workers;
    }
    if let Err(e) = settings.validate_all() {
        error!(error = %e, "Invalid configuration, aborting before any fetch");
        return Err(e.into());
    }
    info!("Configuration loaded");

    // 3. Collect targets
    let domains = collect_targets(&cli)?;
    if domains.is_empty() {
        bail!("no valid domains given; pass domains as arguments or with --file");
    }

    // 4. Build components
    let store = Arc::new(InMemoryStore::new());
    let worker = CrawlWorker::from_settings(
        &settings,
        Arc::new(ReqwestFetcher::new()),
        store.clone(),
        store.clone(),
        store.clone(),
    )?;
    let manager = WorkerManager::new(Arc::new(worker), settings.crawler.workers);
    manager.cancel_on_shutdown_signal();

    // 5. Run and report
    let summaries = manager.run(domains).await;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for summary in &summaries {
        writeln!(out, "{}", serde_json::to_string(summary)?)?;
    }
    Ok(())
}

fn collect_targets(cli: &Cli) -> anyhow::Result<Vec<LeadDomain>> {
    let mut raw: Vec<String> = cli.targets.clone();
    if let Some(path) = &cli.file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        raw.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string),
        );
    }

    let now = Utc::now();
    let mut seen = HashSet::new();
    let mut domains = Vec::new();
    for target in raw {
        let Some((domain, start_url)) = parse_target(&target) else {
            warn!(target = %target, "Ignoring target that is not a domain or http(s) URL");
            continue;
        };
        if !seen.insert(domain.clone()) {
            continue;
        }
        let mut lead = LeadDomain::new(domain, cli.category.clone(), now);
        if let Some(url) = start_url {
            lead = lead.with_start_url(url);
        }
        domains.push(lead);
    }
    Ok(domains)
}
