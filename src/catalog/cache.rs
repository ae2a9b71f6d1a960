//! Shared read-only cache in front of a catalog.
//!
//! Catalog records are immutable once loaded, so cached entries never go
//! stale; only withdrawal needs an explicit [`CatalogCache::invalidate`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::filter::FilterCriteria;
use super::model::{University, UniversityId};
use super::Catalog;
use crate::error::EngineError;

pub struct CatalogCache {
    inner: Arc<dyn Catalog>,
    entries: RwLock<HashMap<UniversityId, University>>,
}

impl CatalogCache {
    pub fn new(inner: Arc<dyn Catalog>) -> Self {
        Self {
            inner,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Forget a cached entry.
    pub async fn invalidate(&self, id: UniversityId) {
        self.entries.write().await.remove(&id);
    }

    /// Number of cached entries.
    pub async fn cached_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl Catalog for CatalogCache {
    async fn get_university(&self, id: UniversityId) -> Result<University, EngineError> {
        if let Some(hit) = self.entries.read().await.get(&id) {
            return Ok(hit.clone());
        }

        let university = self.inner.get_university(id).await?;
        debug!(university_id = id, "Catalog cache fill");
        self.entries.write().await.insert(id, university.clone());
        Ok(university)
    }

    async fn filter(&self, criteria: &FilterCriteria) -> Result<Vec<University>, EngineError> {
        let found = self.inner.filter(criteria).await?;
        let mut entries = self.entries.write().await;
        for u in &found {
            entries.entry(u.id).or_insert_with(|| u.clone());
        }
        Ok(found)
    }
}
