// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::change::ChangeEvent;
use crate::domain::models::company::CompanyProfile;
use crate::domain::models::score::ScoreRecord;
use crate::utils::errors::RepositoryError;
use async_trait::async_trait;

/// 线索仓库特质
///
/// 保存公司画像快照、评分历史和变更事件。评分与事件只追加。
#[async_trait]
pub trait LeadRepository: Send + Sync {
    /// 保存画像快照，替换该域名之前的快照
    async fn save_profile(&self, profile: &CompanyProfile) -> Result<(), RepositoryError>;

    /// 最近一次保存的画像
    async fn latest_profile(&self, domain: &str) -> Result<Option<CompanyProfile>, RepositoryError>;

    /// 追加评分记录
    async fn append_score(&self, score: &ScoreRecord) -> Result<(), RepositoryError>;

    /// 最近一次评分
    async fn latest_score(&self, domain: &str) -> Result<Option<ScoreRecord>, RepositoryError>;

    /// 评分历史，按评分顺序返回
    async fn score_history(&self, domain: &str) -> Result<Vec<ScoreRecord>, RepositoryError>;

    /// 追加变更事件
    async fn append_changes(&self, events: &[ChangeEvent]) -> Result<(), RepositoryError>;

    /// 某个域名的变更事件
    async fn changes_for(&self, domain: &str) -> Result<Vec<ChangeEvent>, RepositoryError>;
}
