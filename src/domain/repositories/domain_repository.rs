// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::lead_domain::{DomainStatus, LeadDomain};
use crate::utils::errors::RepositoryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// 域名仓库特质
///
/// 定义线索域名的数据访问接口。域名从不删除，只会被标记为 blocked。
#[async_trait]
pub trait DomainRepository: Send + Sync {
    /// 创建或更新域名
    ///
    /// # 参数
    ///
    /// * `domain` - 域名实体
    ///
    /// # 返回值
    ///
    /// * `Ok(())` - 保存成功
    /// * `Err(RepositoryError)` - 保存失败
    async fn upsert(&self, domain: &LeadDomain) -> Result<(), RepositoryError>;

    /// 根据域名查找
    async fn find(&self, domain: &str) -> Result<Option<LeadDomain>, RepositoryError>;

    /// 更新域名状态
    ///
    /// # 返回值
    ///
    /// * `Ok(LeadDomain)` - 更新后的域名
    /// * `Err(RepositoryError::NotFound)` - 域名不存在
    async fn update_status(
        &self,
        domain: &str,
        status: DomainStatus,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<LeadDomain, RepositoryError>;

    /// 列出全部域名，按域名排序
    async fn list(&self) -> Result<Vec<LeadDomain>, RepositoryError>;
}
