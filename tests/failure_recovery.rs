//! Recovery from storage failures and from catalog withdrawals that race
//! with a user's own operations.
//!
//! The engine runs over `FlakyDb`, a libSQL backend wrapper that can slow
//! down shortlist reads or fail selected writes on demand.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal_macros::dec;
use uuid::Uuid;

use counsel_engine::catalog::{FilterCriteria, University, UniversityId};
use counsel_engine::config::EngineConfig;
use counsel_engine::error::{DatabaseError, EngineError};
use counsel_engine::profile::UserProfile;
use counsel_engine::shortlist::UserUniversity;
use counsel_engine::stage::{Stage, UserState};
use counsel_engine::store::{Database, LibSqlBackend};
use counsel_engine::tasks::Task;
use counsel_engine::CounselingEngine;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a slowed shortlist read takes.
const SLOW_READ: Duration = Duration::from_millis(100);

struct FlakyDb {
    inner: Arc<LibSqlBackend>,
    slow_shortlist_reads: AtomicBool,
    /// Task inserts still allowed before the next one fails.
    task_inserts_left: AtomicUsize,
    fail_state_insert: AtomicBool,
}

impl FlakyDb {
    fn new(inner: Arc<LibSqlBackend>) -> Self {
        Self {
            inner,
            slow_shortlist_reads: AtomicBool::new(false),
            task_inserts_left: AtomicUsize::new(usize::MAX),
            fail_state_insert: AtomicBool::new(false),
        }
    }

    fn fail_task_insert_after(&self, allowed: usize) {
        self.task_inserts_left.store(allowed, Ordering::SeqCst);
    }
}

#[async_trait]
impl Database for FlakyDb {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        self.inner.run_migrations().await
    }

    async fn insert_profile(&self, profile: &UserProfile) -> Result<(), DatabaseError> {
        self.inner.insert_profile(profile).await
    }

    async fn get_profile(&self, id: Uuid) -> Result<Option<UserProfile>, DatabaseError> {
        self.inner.get_profile(id).await
    }

    async fn get_profile_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserProfile>, DatabaseError> {
        self.inner.get_profile_by_email(email).await
    }

    async fn update_profile(&self, profile: &UserProfile) -> Result<(), DatabaseError> {
        self.inner.update_profile(profile).await
    }

    async fn delete_profile(&self, id: Uuid) -> Result<bool, DatabaseError> {
        self.inner.delete_profile(id).await
    }

    async fn insert_user_state(&self, state: &UserState) -> Result<(), DatabaseError> {
        if self.fail_state_insert.load(Ordering::SeqCst) {
            return Err(DatabaseError::Query("disk full".into()));
        }
        self.inner.insert_user_state(state).await
    }

    async fn get_user_state(&self, user_id: Uuid) -> Result<Option<UserState>, DatabaseError> {
        self.inner.get_user_state(user_id).await
    }

    async fn update_user_state(&self, state: &UserState) -> Result<(), DatabaseError> {
        self.inner.update_user_state(state).await
    }

    async fn upsert_university(&self, university: &University) -> Result<(), DatabaseError> {
        self.inner.upsert_university(university).await
    }

    async fn get_university(
        &self,
        id: UniversityId,
    ) -> Result<Option<University>, DatabaseError> {
        self.inner.get_university(id).await
    }

    async fn filter_universities(
        &self,
        criteria: &FilterCriteria,
    ) -> Result<Vec<University>, DatabaseError> {
        self.inner.filter_universities(criteria).await
    }

    async fn delete_university(&self, id: UniversityId) -> Result<bool, DatabaseError> {
        self.inner.delete_university(id).await
    }

    async fn insert_user_university(&self, record: &UserUniversity) -> Result<(), DatabaseError> {
        self.inner.insert_user_university(record).await
    }

    async fn get_user_university(
        &self,
        user_id: Uuid,
        university_id: UniversityId,
    ) -> Result<Option<UserUniversity>, DatabaseError> {
        self.inner.get_user_university(user_id, university_id).await
    }

    async fn update_user_university(&self, record: &UserUniversity) -> Result<bool, DatabaseError> {
        self.inner.update_user_university(record).await
    }

    async fn restore_user_university(
        &self,
        record: &UserUniversity,
    ) -> Result<bool, DatabaseError> {
        self.inner.restore_user_university(record).await
    }

    async fn delete_user_university(
        &self,
        user_id: Uuid,
        university_id: UniversityId,
    ) -> Result<bool, DatabaseError> {
        self.inner.delete_user_university(user_id, university_id).await
    }

    async fn list_user_universities(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<UserUniversity>, DatabaseError> {
        let records = self.inner.list_user_universities(user_id).await;
        if self.slow_shortlist_reads.load(Ordering::SeqCst) {
            tokio::time::sleep(SLOW_READ).await;
        }
        records
    }

    async fn insert_task(&self, task: &Task) -> Result<(), DatabaseError> {
        let exhausted = self
            .task_inserts_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_err();
        if exhausted {
            return Err(DatabaseError::Query("disk full".into()));
        }
        self.inner.insert_task(task).await
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, DatabaseError> {
        self.inner.get_task(id).await
    }

    async fn update_task(&self, task: &Task) -> Result<(), DatabaseError> {
        self.inner.update_task(task).await
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, DatabaseError> {
        self.inner.delete_task(id).await
    }

    async fn list_tasks(&self, user_id: Uuid) -> Result<Vec<Task>, DatabaseError> {
        self.inner.list_tasks(user_id).await
    }
}

async fn flaky_engine() -> (CounselingEngine, Arc<FlakyDb>) {
    let backend = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    for u in [
        University::new(1, "Northfield University", "Canada", Some(120), dec!(24000)),
        University::new(2, "Lakeside Institute", "Canada", Some(35), dec!(41000)),
        University::new(3, "Rhine Technical University", "Germany", Some(80), dec!(3000)),
    ] {
        backend.upsert_university(&u).await.unwrap();
    }
    let db = Arc::new(FlakyDb::new(backend.clone()));
    let engine = CounselingEngine::new(db.clone(), backend, EngineConfig::default());
    (engine, db)
}

fn complete_profile(email: &str) -> UserProfile {
    UserProfile::new(email)
        .with_name("Sam")
        .with_gpa(dec!(8.1))
        .with_academics("Bachelors", "Masters", "Computer Science")
        .with_budget(dec!(30000))
        .with_countries(["Canada", "Germany"])
}

#[tokio::test]
async fn withdrawal_waits_for_an_in_flight_lock() {
    tokio::time::timeout(TEST_TIMEOUT, async {
        let (engine, db) = flaky_engine().await;
        let user = engine
            .create_profile(UserProfile::new("race@example.com"))
            .await
            .unwrap()
            .id;
        engine.shortlist(user, 2, "reach").await.unwrap();

        db.slow_shortlist_reads.store(true, Ordering::SeqCst);
        let (locked, withdrawn) = tokio::join!(engine.lock(user, 2), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            engine.withdraw_university(2).await
        });
        db.slow_shortlist_reads.store(false, Ordering::SeqCst);

        assert!(locked.unwrap().locked);
        withdrawn.unwrap();

        assert!(engine.list_locked(user).await.unwrap().is_empty());
        assert!(engine.list_shortlisted(user).await.unwrap().is_empty());
        assert!(matches!(
            engine.university(2).await,
            Err(EngineError::NotFound { .. })
        ));

        let tasks = engine.tasks(user).await.unwrap();
        assert!(!tasks.is_empty());
        assert!(
            tasks
                .iter()
                .filter(|t| t.university_id == Some(2))
                .all(|t| !t.is_open()),
            "scoped tasks of a withdrawn university must not stay open"
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn failed_task_generation_undoes_the_lock() {
    tokio::time::timeout(TEST_TIMEOUT, async {
        let (engine, db) = flaky_engine().await;
        let user = engine
            .create_profile(UserProfile::new("lockfail@example.com"))
            .await
            .unwrap()
            .id;
        engine.shortlist(user, 1, "match").await.unwrap();

        db.fail_task_insert_after(2);
        let err = engine.lock(user, 1).await.unwrap_err();
        assert!(matches!(err, EngineError::Database(_)), "got {err:?}");

        assert!(engine.list_locked(user).await.unwrap().is_empty());
        assert_eq!(engine.list_shortlisted(user).await.unwrap().len(), 1);
        assert!(engine.tasks(user).await.unwrap().is_empty());

        // Storage is healthy again: the same lock now goes through whole.
        db.fail_task_insert_after(usize::MAX);
        engine.lock(user, 1).await.unwrap();
        let tasks = engine.tasks(user).await.unwrap();
        assert_eq!(tasks.len(), 5);
        assert!(tasks.iter().all(|t| t.university_id == Some(1) && t.is_open()));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn failed_task_generation_undoes_the_stage_advance() {
    tokio::time::timeout(TEST_TIMEOUT, async {
        let (engine, db) = flaky_engine().await;
        let user = engine
            .create_profile(complete_profile("advancefail@example.com"))
            .await
            .unwrap()
            .id;
        engine.advance(user).await.unwrap();
        engine.shortlist(user, 1, "match").await.unwrap();
        engine.advance(user).await.unwrap();
        engine.lock(user, 1).await.unwrap();
        assert_eq!(engine.current_stage(user).await.unwrap(), Stage::Shortlisting);
        let before = engine.tasks(user).await.unwrap();

        db.fail_task_insert_after(1);
        assert!(matches!(
            engine.advance(user).await,
            Err(EngineError::Database(_))
        ));

        assert_eq!(engine.current_stage(user).await.unwrap(), Stage::Shortlisting);
        let after = engine.tasks(user).await.unwrap();
        assert_eq!(after.len(), before.len());
        assert!(!after.iter().any(|t| t.stage == Stage::Locked));

        db.fail_task_insert_after(usize::MAX);
        engine.advance(user).await.unwrap();
        assert_eq!(engine.current_stage(user).await.unwrap(), Stage::Locked);
        assert_eq!(
            engine
                .tasks(user)
                .await
                .unwrap()
                .iter()
                .filter(|t| t.stage == Stage::Locked && t.university_id.is_none())
                .count(),
            3
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn failed_state_insert_leaves_no_profile_behind() {
    tokio::time::timeout(TEST_TIMEOUT, async {
        let (engine, db) = flaky_engine().await;

        db.fail_state_insert.store(true, Ordering::SeqCst);
        let err = engine
            .create_profile(UserProfile::new("orphan@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Database(_)), "got {err:?}");
        assert!(db.get_profile_by_email("orphan@example.com").await.unwrap().is_none());

        db.fail_state_insert.store(false, Ordering::SeqCst);
        let profile = engine.get_or_create_profile("orphan@example.com").await.unwrap();
        assert_eq!(engine.current_stage(profile.id).await.unwrap(), Stage::Onboarding);
    })
    .await
    .expect("test timed out");
}
