// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

use crate::engines::traits::FetchError;

/// 线索爬取错误类型
///
/// 覆盖合规检查、限流、抓取、提取和配置几类故障。
/// `PolicyDenied` 与 `RateLimitExceeded` 属于可在本地恢复的结果，而非系统故障。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LeadError {
    #[error("robots 策略拒绝访问: {0}")]
    PolicyDenied(String),

    #[error("域名请求已达到每小时上限: {0}")]
    RateLimitExceeded(String),

    #[error("抓取超时: {0}")]
    FetchTimeout(String),

    #[error("连接错误: {0}")]
    FetchConnectionError(String),

    #[error("服务器错误 {status}: {url}")]
    FetchServerError { url: String, status: u16 },

    #[error("客户端错误 {status}: {url}")]
    FetchClientError { url: String, status: u16 },

    #[error("内容提取错误: {0}")]
    ExtractionError(String),

    #[error("配置错误: {0}")]
    ConfigurationError(String),

    #[error("仓库错误: {0}")]
    Repository(String),
}

impl LeadError {
    /// 从引擎层错误转换，附带请求URL
    pub fn from_fetch(url: &str, error: FetchError) -> Self {
        match error {
            FetchError::Timeout => LeadError::FetchTimeout(url.to_string()),
            FetchError::Connection(msg) => {
                LeadError::FetchConnectionError(format!("{}: {}", url, msg))
            }
            FetchError::Status(status) if status >= 500 || status == 429 => {
                LeadError::FetchServerError {
                    url: url.to_string(),
                    status,
                }
            }
            FetchError::Status(status) => LeadError::FetchClientError {
                url: url.to_string(),
                status,
            },
            FetchError::InvalidUrl(msg) | FetchError::Other(msg) => {
                LeadError::FetchConnectionError(format!("{}: {}", url, msg))
            }
        }
    }

    /// 是否应当增加域名的退避倍数
    ///
    /// 超时、连接错误、5xx 和 429 会触发退避；其他 4xx 不会。
    pub fn triggers_backoff(&self) -> bool {
        matches!(
            self,
            LeadError::FetchTimeout(_)
                | LeadError::FetchConnectionError(_)
                | LeadError::FetchServerError { .. }
        )
    }
}

/// 仓库层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("未找到数据: {0}")]
    NotFound(String),

    #[error("无效参数: {0}")]
    InvalidParameter(String),

    #[error("内部错误: {0}")]
    InternalError(String),
}

impl From<RepositoryError> for LeadError {
    fn from(err: RepositoryError) -> Self {
        LeadError::Repository(err.to_string())
    }
}
