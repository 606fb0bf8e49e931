// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 提供域名处理和工作器管理功能
/// 包括单个域名的爬取评分流程，以及有界并发的批量运行
pub mod crawl_worker;
pub mod manager;

pub use crawl_worker::{CrawlWorker, DomainRunSummary};
pub use manager::WorkerManager;
