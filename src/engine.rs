//! Counseling engine facade.
//!
//! Wires storage, catalog, managers and the task orchestrator together and
//! runs every mutating operation inside the acting user's scope.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{RwLock, broadcast};
use tracing::info;
use uuid::Uuid;

use crate::catalog::{
    Catalog, CatalogCache, FilterCriteria, Suggestions, University, UniversityId, categorize,
};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::events::{BroadcastSink, EngineEvent};
use crate::profile::{ProfileStore, ProfileStrength, UserProfile, profile_strength};
use crate::scope::{UserLocks, UserScope};
use crate::shortlist::{CategoryBalance, ShortlistManager, UserUniversity};
use crate::stage::{Stage, StageMachine, UserState};
use crate::store::Database;
use crate::tasks::{OpenTasks, Task, TaskOrchestrator};

/// Suggestions kept per category.
const SUGGESTIONS_PER_CATEGORY: usize = 5;

/// Everything the home screen shows for one user.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub profile: UserProfile,
    pub stage: Stage,
    pub strength: ProfileStrength,
    pub open_tasks: Vec<Task>,
    pub shortlisted: Vec<UserUniversity>,
    pub balance: CategoryBalance,
}

pub struct CounselingEngine {
    config: EngineConfig,
    db: Arc<dyn Database>,
    locks: UserLocks,
    /// Shortlist mutations hold this shared; withdrawing a catalog entry
    /// holds it exclusively.
    catalog_gate: RwLock<()>,
    catalog: Arc<CatalogCache>,
    profiles: Arc<ProfileStore>,
    shortlist: Arc<ShortlistManager>,
    stages: StageMachine,
    tasks: Arc<TaskOrchestrator>,
    events: Arc<BroadcastSink>,
}

impl CounselingEngine {
    pub fn new(db: Arc<dyn Database>, catalog: Arc<dyn Catalog>, config: EngineConfig) -> Self {
        let catalog = Arc::new(CatalogCache::new(catalog));
        let tasks = Arc::new(TaskOrchestrator::new(db.clone()));
        let events = Arc::new(BroadcastSink::new(tasks.clone()));
        let profiles = Arc::new(ProfileStore::new(db.clone()));
        let shortlist = Arc::new(ShortlistManager::new(
            db.clone(),
            catalog.clone(),
            events.clone(),
            config.max_locked,
        ));
        let stages = StageMachine::new(
            db.clone(),
            profiles.clone(),
            shortlist.clone(),
            tasks.clone(),
            events.clone(),
        );

        info!(max_locked = config.max_locked, "Counseling engine ready");
        Self {
            config,
            db,
            locks: UserLocks::new(),
            catalog_gate: RwLock::new(()),
            catalog,
            profiles,
            shortlist,
            stages,
            tasks,
            events,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Acquire the user's scope directly, for callers composing several
    /// operations into one serialized sequence.
    pub async fn scope(&self, user_id: Uuid) -> Result<UserScope> {
        self.locks.acquire(user_id, self.config.scope_wait).await
    }

    /// Events delivered after each committed transition or lock change.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    // ── Profiles ────────────────────────────────────────────────────

    pub async fn create_profile(&self, profile: UserProfile) -> Result<UserProfile> {
        self.profiles.create_profile(profile).await
    }

    pub async fn get_or_create_profile(&self, email: &str) -> Result<UserProfile> {
        self.profiles.get_or_create_by_email(email).await
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<UserProfile> {
        self.profiles.get_profile(user_id).await
    }

    pub async fn is_profile_complete(&self, user_id: Uuid) -> Result<bool> {
        self.profiles.is_complete(user_id).await
    }

    pub async fn missing_fields(&self, user_id: Uuid) -> Result<Vec<&'static str>> {
        self.profiles.missing_fields(user_id).await
    }

    pub async fn update_profile(&self, profile: UserProfile) -> Result<UserProfile> {
        let scope = self.scope(profile.id).await?;
        self.profiles.update_profile(&scope, profile).await
    }

    pub async fn delete_profile(&self, user_id: Uuid) -> Result<()> {
        let scope = self.scope(user_id).await?;
        self.profiles.delete_profile(&scope).await
    }

    pub async fn profile_strength(&self, user_id: Uuid) -> Result<ProfileStrength> {
        let profile = self.profiles.get_profile(user_id).await?;
        let summary = self.shortlist.summary(user_id).await?;
        Ok(profile_strength(&profile, !summary.locked.is_empty()))
    }

    // ── Shortlist ───────────────────────────────────────────────────

    pub async fn shortlist(
        &self,
        user_id: Uuid,
        university_id: UniversityId,
        category: &str,
    ) -> Result<UserUniversity> {
        let scope = self.scope(user_id).await?;
        let _catalog = self.catalog_gate.read().await;
        self.shortlist.shortlist(&scope, university_id, category).await
    }

    pub async fn unshortlist(
        &self,
        user_id: Uuid,
        university_id: UniversityId,
    ) -> Result<()> {
        let scope = self.scope(user_id).await?;
        let _catalog = self.catalog_gate.read().await;
        self.shortlist.unshortlist(&scope, university_id).await
    }

    pub async fn lock(
        &self,
        user_id: Uuid,
        university_id: UniversityId,
    ) -> Result<UserUniversity> {
        let scope = self.scope(user_id).await?;
        let _catalog = self.catalog_gate.read().await;
        self.shortlist.lock(&scope, university_id).await
    }

    pub async fn unlock(
        &self,
        user_id: Uuid,
        university_id: UniversityId,
    ) -> Result<UserUniversity> {
        let scope = self.scope(user_id).await?;
        let _catalog = self.catalog_gate.read().await;
        self.shortlist.unlock(&scope, university_id).await
    }

    pub async fn list_shortlisted(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<UserUniversity>> {
        self.shortlist.list_shortlisted(user_id).await
    }

    pub async fn list_locked(&self, user_id: Uuid) -> Result<Vec<UserUniversity>> {
        self.shortlist.list_locked(user_id).await
    }

    pub async fn category_balance(&self, user_id: Uuid) -> Result<CategoryBalance> {
        self.shortlist.category_balance(user_id).await
    }

    // ── Stages ──────────────────────────────────────────────────────

    pub async fn current_stage(&self, user_id: Uuid) -> Result<Stage> {
        self.stages.current_stage(user_id).await
    }

    pub async fn advance(&self, user_id: Uuid) -> Result<UserState> {
        let scope = self.scope(user_id).await?;
        self.stages.advance(&scope).await
    }

    pub async fn regress(&self, user_id: Uuid, to: Stage) -> Result<UserState> {
        let scope = self.scope(user_id).await?;
        self.stages.regress(&scope, to).await
    }

    // ── Tasks ───────────────────────────────────────────────────────

    pub async fn complete_task(&self, user_id: Uuid, task_id: Uuid) -> Result<Task> {
        let scope = self.scope(user_id).await?;
        self.tasks.complete(&scope, task_id).await
    }

    pub async fn open_tasks(&self, user_id: Uuid) -> Result<OpenTasks> {
        self.tasks.list_open(user_id).await
    }

    /// All tasks, obsolete and completed ones included.
    pub async fn tasks(&self, user_id: Uuid) -> Result<Vec<Task>> {
        self.tasks.list_tasks(user_id).await
    }

    // ── Catalog ─────────────────────────────────────────────────────

    pub async fn university(&self, id: UniversityId) -> Result<University> {
        self.catalog.get_university(id).await
    }

    /// Catalog entries matching the user's countries and buffered budget.
    pub async fn filter_for(&self, user_id: Uuid) -> Result<Vec<University>> {
        let profile = self.profiles.get_profile(user_id).await?;
        let criteria = FilterCriteria::for_profile(&profile, &self.config);
        self.catalog.filter(&criteria).await
    }

    /// Filtered entries split into reach/match/safety by fit.
    pub async fn suggestions(&self, user_id: Uuid) -> Result<Suggestions> {
        let profile = self.profiles.get_profile(user_id).await?;
        let criteria = FilterCriteria::for_profile(&profile, &self.config);
        let found = self.catalog.filter(&criteria).await?;
        Ok(categorize(
            found,
            profile.gpa.unwrap_or(Decimal::ZERO),
            profile.budget_per_year.unwrap_or(Decimal::ZERO),
            SUGGESTIONS_PER_CATEGORY,
        ))
    }

    /// Withdraw a catalog entry stored in this engine's database.
    ///
    /// Shortlist records pointing at it are archived and its open scoped
    /// tasks become obsolete; nothing users did is deleted. Waits for
    /// in-flight shortlist and lock operations to finish first.
    pub async fn withdraw_university(&self, id: UniversityId) -> Result<()> {
        let _gate = self.catalog_gate.write().await;
        let removed = self.db.delete_university(id).await?;
        self.catalog.invalidate(id).await;
        if !removed {
            return Err(EngineError::not_found("university", id));
        }
        Ok(())
    }

    // ── Dashboard ───────────────────────────────────────────────────

    pub async fn dashboard(&self, user_id: Uuid) -> Result<Dashboard> {
        let profile = self.profiles.get_profile(user_id).await?;
        let stage = self.stages.current_stage(user_id).await?;
        let shortlisted = self.shortlist.list_shortlisted(user_id).await?;
        let strength = profile_strength(&profile, shortlisted.iter().any(|r| r.locked));
        let balance = CategoryBalance::from_records(&shortlisted);
        let open_tasks = self.tasks.list_open(user_id).await?.collect();

        Ok(Dashboard {
            profile,
            stage,
            strength,
            open_tasks,
            shortlisted,
            balance,
        })
    }
}
