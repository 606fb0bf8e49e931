// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::domain::models::change::ChangeEvent;
use crate::domain::models::company::CompanyProfile;
use crate::domain::models::lead_domain::{DomainStatus, LeadDomain};
use crate::domain::models::page::PageRecord;
use crate::domain::models::score::ScoreRecord;
use crate::domain::repositories::domain_repository::DomainRepository;
use crate::domain::repositories::lead_repository::LeadRepository;
use crate::domain::repositories::page_repository::PageRepository;
use crate::utils::errors::RepositoryError;

/// 内存仓库实现
///
/// 同时实现三个仓库接口，数据按域名分区保存。
/// 页面记录、评分和变更事件只追加，不提供删除操作。
#[derive(Default)]
pub struct InMemoryStore {
    domains: DashMap<String, LeadDomain>,
    pages: DashMap<String, Vec<PageRecord>>,
    /// URL -> (域名, 该域名页面列表中的下标)
    latest_page_index: DashMap<String, (String, usize)>,
    profiles: DashMap<String, CompanyProfile>,
    scores: DashMap<String, Vec<ScoreRecord>>,
    changes: RwLock<Vec<ChangeEvent>>,
}

impl InMemoryStore {
    /// 创建空的内存仓库
    pub fn new() -> Self {
        Self::default()
    }

    /// 全部变更事件，按写入顺序
    pub fn all_changes(&self) -> Vec<ChangeEvent> {
        self.changes.read().clone()
    }
}

#[async_trait]
impl DomainRepository for InMemoryStore {
    async fn upsert(&self, domain: &LeadDomain) -> Result<(), RepositoryError> {
        if domain.domain.is_empty() {
            return Err(RepositoryError::InvalidParameter(
                "domain must not be empty".to_string(),
            ));
        }
        self.domains.insert(domain.domain.clone(), domain.clone());
        Ok(())
    }

    async fn find(&self, domain: &str) -> Result<Option<LeadDomain>, RepositoryError> {
        Ok(self.domains.get(domain).map(|d| d.value().clone()))
    }

    async fn update_status(
        &self,
        domain: &str,
        status: DomainStatus,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<LeadDomain, RepositoryError> {
        let mut entry = self
            .domains
            .get_mut(domain)
            .ok_or_else(|| RepositoryError::NotFound(domain.to_string()))?;

        match status {
            DomainStatus::Blocked => {
                entry.mark_blocked(reason.unwrap_or_else(|| "blocked".to_string()), now)
            }
            // Only a manual clear lifts a block
            _ if entry.is_blocked() => {
                return Err(RepositoryError::InvalidParameter(format!(
                    "{} is blocked and must be cleared before changing status",
                    domain
                )));
            }
            other => {
                entry.status = other;
                entry.updated_at = now;
            }
        }
        Ok(entry.value().clone())
    }

    async fn list(&self) -> Result<Vec<LeadDomain>, RepositoryError> {
        let mut domains: Vec<LeadDomain> = self.domains.iter().map(|d| d.value().clone()).collect();
        domains.sort_by(|a, b| a.domain.cmp(&b.domain));
        Ok(domains)
    }
}

#[async_trait]
impl PageRepository for InMemoryStore {
    async fn append(&self, page: &PageRecord) -> Result<(), RepositoryError> {
        if !self.domains.contains_key(&page.domain) {
            return Err(RepositoryError::NotFound(format!(
                "page {} belongs to unknown domain {}",
                page.url, page.domain
            )));
        }
        let mut pages = self.pages.entry(page.domain.clone()).or_default();
        pages.push(page.clone());
        self.latest_page_index
            .insert(page.url.clone(), (page.domain.clone(), pages.len() - 1));
        Ok(())
    }

    async fn find_by_domain(&self, domain: &str) -> Result<Vec<PageRecord>, RepositoryError> {
        Ok(self
            .pages
            .get(domain)
            .map(|pages| pages.value().clone())
            .unwrap_or_default())
    }

    async fn latest_by_url(&self, url: &str) -> Result<Option<PageRecord>, RepositoryError> {
        let Some(index) = self.latest_page_index.get(url).map(|i| i.value().clone()) else {
            return Ok(None);
        };
        let (domain, position) = index;
        Ok(self
            .pages
            .get(&domain)
            .and_then(|pages| pages.get(position).cloned()))
    }
}

#[async_trait]
impl LeadRepository for InMemoryStore {
    async fn save_profile(&self, profile: &CompanyProfile) -> Result<(), RepositoryError> {
        self.profiles.insert(profile.domain.clone(), profile.clone());
        Ok(())
    }

    async fn latest_profile(&self, domain: &str) -> Result<Option<CompanyProfile>, RepositoryError> {
        Ok(self.profiles.get(domain).map(|p| p.value().clone()))
    }

    async fn append_score(&self, score: &ScoreRecord) -> Result<(), RepositoryError> {
        if !self.domains.contains_key(&score.domain) {
            return Err(RepositoryError::NotFound(format!(
                "score for unknown domain {}",
                score.domain
            )));
        }
        self.scores
            .entry(score.domain.clone())
            .or_default()
            .push(score.clone());
        Ok(())
    }

    async fn latest_score(&self, domain: &str) -> Result<Option<ScoreRecord>, RepositoryError> {
        Ok(self
            .scores
            .get(domain)
            .and_then(|scores| scores.last().cloned()))
    }

    async fn score_history(&self, domain: &str) -> Result<Vec<ScoreRecord>, RepositoryError> {
        Ok(self
            .scores
            .get(domain)
            .map(|scores| scores.value().clone())
            .unwrap_or_default())
    }

    async fn append_changes(&self, events: &[ChangeEvent]) -> Result<(), RepositoryError> {
        self.changes.write().extend(events.iter().cloned());
        Ok(())
    }

    async fn changes_for(&self, domain: &str) -> Result<Vec<ChangeEvent>, RepositoryError> {
        Ok(self
            .changes
            .read()
            .iter()
            .filter(|e| e.domain == domain)
            .cloned()
            .collect())
    }
}
