//! Unified `Database` trait: single async interface for all persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::catalog::{FilterCriteria, University, UniversityId};
use crate::error::DatabaseError;
use crate::profile::UserProfile;
use crate::shortlist::UserUniversity;
use crate::stage::UserState;
use crate::tasks::Task;

/// Backend-agnostic database trait covering profiles, stages, the
/// catalog, shortlist records and tasks.
///
/// Implementations enforce the storage-level guarantees: one profile per
/// email, one user-university record per (user, university), one task per
/// (user, stage, template, university), and cascade of owned rows when a
/// profile is deleted.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Profiles ────────────────────────────────────────────────────

    async fn insert_profile(&self, profile: &UserProfile) -> Result<(), DatabaseError>;

    async fn get_profile(&self, id: Uuid) -> Result<Option<UserProfile>, DatabaseError>;

    async fn get_profile_by_email(&self, email: &str)
    -> Result<Option<UserProfile>, DatabaseError>;

    async fn update_profile(&self, profile: &UserProfile) -> Result<(), DatabaseError>;

    /// Delete a profile with its state, shortlist records and tasks.
    /// Returns `false` if no such profile existed.
    async fn delete_profile(&self, id: Uuid) -> Result<bool, DatabaseError>;

    // ── Stage state ─────────────────────────────────────────────────

    async fn insert_user_state(&self, state: &UserState) -> Result<(), DatabaseError>;

    async fn get_user_state(&self, user_id: Uuid) -> Result<Option<UserState>, DatabaseError>;

    async fn update_user_state(&self, state: &UserState) -> Result<(), DatabaseError>;

    // ── Catalog storage ─────────────────────────────────────────────

    /// Insert or replace a catalog entry.
    async fn upsert_university(&self, university: &University) -> Result<(), DatabaseError>;

    async fn get_university(&self, id: UniversityId)
    -> Result<Option<University>, DatabaseError>;

    /// Entries matching `criteria`, best rank first, unranked last.
    async fn filter_universities(
        &self,
        criteria: &FilterCriteria,
    ) -> Result<Vec<University>, DatabaseError>;

    /// Withdraw a catalog entry. Referencing shortlist records are archived
    /// and open scoped tasks become obsolete; neither is deleted.
    async fn delete_university(&self, id: UniversityId) -> Result<bool, DatabaseError>;

    // ── Shortlist records ───────────────────────────────────────────

    async fn insert_user_university(&self, record: &UserUniversity) -> Result<(), DatabaseError>;

    /// Fetch the record for a pairing, archived ones included.
    async fn get_user_university(
        &self,
        user_id: Uuid,
        university_id: UniversityId,
    ) -> Result<Option<UserUniversity>, DatabaseError>;

    /// Write category and flags of a live record. Returns `false` when the
    /// record is gone or archived; archived rows only change through
    /// `restore_user_university`.
    async fn update_user_university(&self, record: &UserUniversity) -> Result<bool, DatabaseError>;

    /// Bring an archived record back as a plain, unlocked shortlist entry
    /// with `record`'s category. Returns `false` unless it was archived.
    async fn restore_user_university(&self, record: &UserUniversity) -> Result<bool, DatabaseError>;

    async fn delete_user_university(
        &self,
        user_id: Uuid,
        university_id: UniversityId,
    ) -> Result<bool, DatabaseError>;

    /// All non-archived records of a user, in insertion order.
    async fn list_user_universities(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<UserUniversity>, DatabaseError>;

    // ── Tasks ───────────────────────────────────────────────────────

    async fn insert_task(&self, task: &Task) -> Result<(), DatabaseError>;

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, DatabaseError>;

    async fn update_task(&self, task: &Task) -> Result<(), DatabaseError>;

    /// Remove a task outright. Only used to undo a creation that never
    /// became visible; retired tasks are flagged obsolete instead.
    async fn delete_task(&self, id: Uuid) -> Result<bool, DatabaseError>;

    /// All tasks of a user, obsolete ones included, in creation order.
    async fn list_tasks(&self, user_id: Uuid) -> Result<Vec<Task>, DatabaseError>;
}
