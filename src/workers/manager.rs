// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use tokio::signal;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::domain::models::lead_domain::LeadDomain;
use crate::workers::crawl_worker::{CrawlWorker, DomainRunSummary};

/// 工作管理器
///
/// 以有界并发处理一批域名：每个域名由一个任务顺序爬取，
/// 不同域名之间并行执行
pub struct WorkerManager {
    worker: Arc<CrawlWorker>,
    concurrency: usize,
    cancel: CancellationToken,
}

impl WorkerManager {
    /// 创建工作管理器
    ///
    /// # 参数
    ///
    /// * `worker` - 共享的爬取工作者
    /// * `concurrency` - 同时处理的域名数量上限
    pub fn new(worker: Arc<CrawlWorker>, concurrency: usize) -> Self {
        Self {
            worker,
            concurrency: concurrency.max(1),
            cancel: CancellationToken::new(),
        }
    }

    /// 运行级取消信号
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 收到 Ctrl-C 时取消本次运行
    ///
    /// 进行中的抓取会自然完成或超时，之后各域名以 cancelled 结束
    pub fn cancel_on_shutdown_signal(&self) {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => info!("Shutdown signal received, finishing in-flight fetches"),
                Err(err) => {
                    error!("Unable to listen for shutdown signal: {}", err);
                    return;
                }
            }
            cancel.cancel();
        });
    }

    /// 处理一批域名
    ///
    /// # 参数
    ///
    /// * `domains` - 待处理的域名
    ///
    /// # 返回值
    ///
    /// 每个域名一条摘要，顺序与输入一致
    pub async fn run(&self, domains: Vec<LeadDomain>) -> Vec<DomainRunSummary> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let total = domains.len();

        info!(domains = total, concurrency = self.concurrency, "Starting crawl run");

        for (index, domain) in domains.into_iter().enumerate() {
            let worker = self.worker.clone();
            let semaphore = semaphore.clone();
            let cancel = self.cancel.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                let name = domain.domain.clone();
                let summary = match worker.process(domain, &cancel).await {
                    Ok(summary) => summary,
                    Err(e) => {
                        error!(domain = %name, error = %e, "Domain processing failed");
                        DomainRunSummary::failed(&name, &e)
                    }
                };
                Some((index, summary))
            });
        }

        let mut results: Vec<Option<DomainRunSummary>> = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some((index, summary))) => results[index] = Some(summary),
                Ok(None) => error!("Worker pool closed before the domain was processed"),
                Err(e) => error!(error = %e, "Crawl task panicked"),
            }
        }

        let summaries: Vec<DomainRunSummary> = results.into_iter().flatten().collect();
        info!(processed = summaries.len(), "Crawl run finished");
        summaries
    }
}
