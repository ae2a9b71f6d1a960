//! Shortlist/lock manager: the shortlist → lock lifecycle of one user.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::model::{Category, CategoryBalance, UserUniversity};
use crate::catalog::{Catalog, UniversityId};
use crate::error::{DatabaseError, EngineError};
use crate::events::{EngineEvent, EventSink};
use crate::scope::UserScope;
use crate::store::Database;

/// Shortlist size and locked ids of one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortlistSummary {
    pub shortlisted: usize,
    pub locked: Vec<UniversityId>,
}

pub struct ShortlistManager {
    db: Arc<dyn Database>,
    catalog: Arc<dyn Catalog>,
    events: Arc<dyn EventSink>,
    max_locked: usize,
}

impl ShortlistManager {
    pub fn new(
        db: Arc<dyn Database>,
        catalog: Arc<dyn Catalog>,
        events: Arc<dyn EventSink>,
        max_locked: usize,
    ) -> Self {
        Self {
            db,
            catalog,
            events,
            max_locked,
        }
    }

    /// Maximum number of simultaneously locked universities.
    pub fn max_locked(&self) -> usize {
        self.max_locked
    }

    /// Add a university to the user's shortlist, unlocked.
    ///
    /// `category` is stored as given apart from alias folding; only blank
    /// tags are rejected.
    pub async fn shortlist(
        &self,
        scope: &UserScope,
        university_id: UniversityId,
        category: &str,
    ) -> Result<UserUniversity, EngineError> {
        let user_id = scope.user_id();
        let category = Category::parse(category).map_err(EngineError::InvalidOperation)?;

        if self.db.get_profile(user_id).await?.is_none() {
            return Err(EngineError::not_found("profile", user_id));
        }
        self.catalog.get_university(university_id).await?;

        let record = match self.db.get_user_university(user_id, university_id).await? {
            Some(existing) if !existing.archived => {
                return Err(duplicate(user_id, university_id));
            }
            // A withdrawn entry came back; reuse its row.
            Some(mut archived) => {
                archived.category = category;
                archived.shortlisted = true;
                archived.archived = false;
                archived.set_locked(false);
                if !self.db.restore_user_university(&archived).await? {
                    return Err(duplicate(user_id, university_id));
                }
                archived
            }
            None => {
                let record = UserUniversity::shortlisted(user_id, university_id, category);
                self.db
                    .insert_user_university(&record)
                    .await
                    .map_err(|e| match e {
                        DatabaseError::Constraint(_) => duplicate(user_id, university_id),
                        other => other.into(),
                    })?;
                record
            }
        };

        info!(
            user_id = %user_id,
            university_id,
            category = %record.category,
            "University shortlisted"
        );
        Ok(record)
    }

    /// Remove a university from the shortlist. Locked entries must be
    /// unlocked first.
    pub async fn unshortlist(
        &self,
        scope: &UserScope,
        university_id: UniversityId,
    ) -> Result<(), EngineError> {
        let user_id = scope.user_id();
        let record = self.active_record(user_id, university_id).await?;
        if record.locked {
            return Err(EngineError::InvalidOperation(format!(
                "university {university_id} is locked; unlock it before removing it"
            )));
        }

        self.db
            .delete_user_university(user_id, university_id)
            .await?;
        info!(user_id = %user_id, university_id, "University removed from shortlist");
        Ok(())
    }

    /// Promote a shortlisted university to a locked choice.
    ///
    /// Locking an already locked university is a no-op. The lock limit is
    /// checked before anything is written.
    pub async fn lock(
        &self,
        scope: &UserScope,
        university_id: UniversityId,
    ) -> Result<UserUniversity, EngineError> {
        let user_id = scope.user_id();
        let records = self.db.list_user_universities(user_id).await?;

        let Some(mut record) = records
            .iter()
            .find(|r| r.university_id == university_id && r.shortlisted)
            .cloned()
        else {
            return Err(missing_entry(user_id, university_id));
        };
        if record.locked {
            return Ok(record);
        }

        let locked = records.iter().filter(|r| r.locked).count();
        if locked >= self.max_locked {
            warn!(user_id = %user_id, university_id, locked, max = self.max_locked, "Lock limit reached");
            return Err(EngineError::LockLimitExceeded {
                max: self.max_locked,
            });
        }

        record.set_locked(true);
        if !self.db.update_user_university(&record).await? {
            return Err(missing_entry(user_id, university_id));
        }

        let event = EngineEvent::UniversityLocked {
            user_id,
            university_id,
        };
        if let Err(e) = self.events.deliver(scope, &event).await {
            record.set_locked(false);
            self.db.update_user_university(&record).await?;
            return Err(e);
        }

        info!(user_id = %user_id, university_id, locked = locked + 1, "University locked");
        Ok(record)
    }

    /// Demote a locked university back to a plain shortlist entry.
    pub async fn unlock(
        &self,
        scope: &UserScope,
        university_id: UniversityId,
    ) -> Result<UserUniversity, EngineError> {
        let user_id = scope.user_id();
        let mut record = self.active_record(user_id, university_id).await?;
        if !record.locked {
            return Err(EngineError::InvalidOperation(format!(
                "university {university_id} is not locked"
            )));
        }

        record.set_locked(false);
        if !self.db.update_user_university(&record).await? {
            return Err(missing_entry(user_id, university_id));
        }

        let event = EngineEvent::UniversityUnlocked {
            user_id,
            university_id,
        };
        if let Err(e) = self.events.deliver(scope, &event).await {
            record.set_locked(true);
            self.db.update_user_university(&record).await?;
            return Err(e);
        }

        info!(user_id = %user_id, university_id, "University unlocked");
        Ok(record)
    }

    /// Locked entries, best catalog rank first.
    pub async fn list_locked(&self, user_id: Uuid) -> Result<Vec<UserUniversity>, EngineError> {
        let records = self
            .db
            .list_user_universities(user_id)
            .await?
            .into_iter()
            .filter(|r| r.locked)
            .collect();
        self.by_rank(records).await
    }

    /// Shortlisted entries (locked ones included), best catalog rank first.
    pub async fn list_shortlisted(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<UserUniversity>, EngineError> {
        let records = self
            .db
            .list_user_universities(user_id)
            .await?
            .into_iter()
            .filter(|r| r.shortlisted)
            .collect();
        self.by_rank(records).await
    }

    /// Shortlist counts per category.
    pub async fn category_balance(&self, user_id: Uuid) -> Result<CategoryBalance, EngineError> {
        let records = self.db.list_user_universities(user_id).await?;
        Ok(CategoryBalance::from_records(
            records.iter().filter(|r| r.shortlisted),
        ))
    }

    /// Counts the stage machine checks against.
    pub async fn summary(&self, user_id: Uuid) -> Result<ShortlistSummary, EngineError> {
        let records = self.db.list_user_universities(user_id).await?;
        Ok(ShortlistSummary {
            shortlisted: records.iter().filter(|r| r.shortlisted).count(),
            locked: records
                .iter()
                .filter(|r| r.locked)
                .map(|r| r.university_id)
                .collect(),
        })
    }

    async fn active_record(
        &self,
        user_id: Uuid,
        university_id: UniversityId,
    ) -> Result<UserUniversity, EngineError> {
        match self.db.get_user_university(user_id, university_id).await? {
            Some(record) if !record.archived => Ok(record),
            _ => Err(missing_entry(user_id, university_id)),
        }
    }

    /// Stable sort by catalog rank; unranked or withdrawn entries go last,
    /// ties keep insertion order.
    async fn by_rank(
        &self,
        records: Vec<UserUniversity>,
    ) -> Result<Vec<UserUniversity>, EngineError> {
        let mut keyed = Vec::with_capacity(records.len());
        for record in records {
            let rank = match self.catalog.get_university(record.university_id).await {
                Ok(u) => u.rank,
                Err(EngineError::NotFound { .. }) => None,
                Err(e) => return Err(e),
            };
            keyed.push((rank.unwrap_or(u32::MAX), record));
        }
        keyed.sort_by_key(|(rank, _)| *rank);
        Ok(keyed.into_iter().map(|(_, r)| r).collect())
    }
}

fn missing_entry(user_id: Uuid, university_id: UniversityId) -> EngineError {
    EngineError::not_found("shortlist entry", format!("{user_id}/{university_id}"))
}

fn duplicate(user_id: Uuid, university_id: UniversityId) -> EngineError {
    EngineError::DuplicateEntry {
        entity: "shortlist entry",
        key: format!("{user_id}/{university_id}"),
    }
}
