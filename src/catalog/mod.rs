//! University catalog: reference data the engine reads but never owns.

pub mod cache;
pub mod classify;
pub mod filter;
pub mod model;

use async_trait::async_trait;

use crate::error::EngineError;

pub use cache::CatalogCache;
pub use classify::{Suggestion, Suggestions, categorize, fit_score, suggest_category};
pub use filter::{FilterCriteria, normalize_country};
pub use model::{Competitiveness, RankingBand, University, UniversityId};

/// Read access to the university catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Look up one entry. Fails with `NotFound` for unknown ids.
    async fn get_university(&self, id: UniversityId) -> Result<University, EngineError>;

    /// Entries matching `criteria`, best rank first, at most `criteria.limit`.
    async fn filter(&self, criteria: &FilterCriteria) -> Result<Vec<University>, EngineError>;
}
