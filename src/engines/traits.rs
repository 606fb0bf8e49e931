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

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// 抓取错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// 超时
    #[error("Timeout")]
    Timeout,
    /// 连接失败
    #[error("Connection failed: {0}")]
    Connection(String),
    /// 非 2xx 状态码
    #[error("Unexpected status: {0}")]
    Status(u16),
    /// URL 无效
    #[error("Invalid url: {0}")]
    InvalidUrl(String),
    /// 其他错误
    #[error("Other error: {0}")]
    Other(String),
}

impl FetchError {
    /// 判断错误是否可重试
    ///
    /// # 返回值
    ///
    /// 如果错误是可重试的则返回true，否则返回false
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Connection(_) => true,
            FetchError::Status(s) => *s >= 500 || *s == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = e.status() {
            FetchError::Status(status.as_u16())
        } else if e.is_connect() || e.is_request() {
            FetchError::Connection(e.to_string())
        } else {
            FetchError::Other(e.to_string())
        }
    }
}

/// 抓取请求
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// 目标URL
    pub url: String,
    /// 请求头
    pub headers: HashMap<String, String>,
    /// 超时时间
    pub timeout: Duration,
    /// User-Agent
    pub user_agent: String,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>, user_agent: &str, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            timeout,
            user_agent: user_agent.to_string(),
        }
    }
}

/// 抓取响应
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP状态码
    pub status_code: u16,
    /// 响应内容
    pub body: String,
    /// 响应头（键为小写）
    pub headers: HashMap<String, String>,
    /// 响应时间（毫秒）
    pub response_time_ms: u64,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// 抓取引擎特质
///
/// 任何状态码都作为 `Ok` 返回，只有网络层失败才返回 `Err`；
/// 由调用方决定如何解释状态码。
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// 执行GET请求
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError>;

    /// 引擎名称
    fn name(&self) -> &'static str;
}
