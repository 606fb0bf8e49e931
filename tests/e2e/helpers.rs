// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use leadcrawl::config::settings::Settings;
use leadcrawl::engines::traits::{FetchError, FetchRequest, FetchResponse, Fetcher};
use leadcrawl::infrastructure::repositories::memory::InMemoryStore;
use leadcrawl::workers::CrawlWorker;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;

/// 脚本化响应
#[derive(Clone)]
pub enum Scripted {
    Page(u16, String),
    Fail(FetchError),
}

/// 按URL返回预设响应的抓取引擎，并记录每次调用
///
/// 未配置的URL返回 404
#[derive(Default)]
pub struct ScriptedFetcher {
    routes: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn page(&self, url: &str, body: &str) {
        self.routes
            .lock()
            .insert(url.to_string(), Scripted::Page(200, body.to_string()));
    }

    pub fn status(&self, url: &str, status: u16) {
        self.routes
            .lock()
            .insert(url.to_string(), Scripted::Page(status, String::new()));
    }

    pub fn fail(&self, url: &str, error: FetchError) {
        self.routes
            .lock()
            .insert(url.to_string(), Scripted::Fail(error));
    }

    /// 所有请求的URL，按调用顺序
    pub fn urls(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(u, _)| u.clone()).collect()
    }

    /// 某个URL前缀下所有请求的时间
    pub fn times_for(&self, prefix: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .iter()
            .filter(|(u, _)| u.starts_with(prefix) && !u.ends_with("/robots.txt"))
            .map(|(_, t)| *t)
            .collect()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        self.calls.lock().push((request.url.clone(), Instant::now()));
        let scripted = self.routes.lock().get(&request.url).cloned();
        match scripted {
            Some(Scripted::Page(status, body)) => Ok(FetchResponse {
                status_code: status,
                body,
                headers: HashMap::new(),
                response_time_ms: 20,
            }),
            Some(Scripted::Fail(error)) => Err(error),
            None => Ok(FetchResponse {
                status_code: 404,
                body: String::new(),
                headers: HashMap::new(),
                response_time_ms: 20,
            }),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// 用脚本化引擎和内存仓库装配工作者
pub fn build_worker(
    settings: &Settings,
    fetcher: Arc<ScriptedFetcher>,
) -> (Arc<CrawlWorker>, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let worker = CrawlWorker::from_settings(
        settings,
        fetcher,
        store.clone(),
        store.clone(),
        store.clone(),
    )
    .expect("default settings are valid");
    (Arc::new(worker), store)
}
