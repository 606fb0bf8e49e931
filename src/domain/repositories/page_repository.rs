// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::page::PageRecord;
use crate::utils::errors::RepositoryError;
use async_trait::async_trait;

/// 页面记录仓库特质
///
/// 页面记录只追加不修改，同一URL的多次抓取各自保存
#[async_trait]
pub trait PageRepository: Send + Sync {
    /// 追加页面记录
    async fn append(&self, page: &PageRecord) -> Result<(), RepositoryError>;

    /// 某个域名的全部页面记录，按写入顺序返回
    async fn find_by_domain(&self, domain: &str) -> Result<Vec<PageRecord>, RepositoryError>;

    /// 某个URL最近的一条记录
    async fn latest_by_url(&self, url: &str) -> Result<Option<PageRecord>, RepositoryError>;
}
