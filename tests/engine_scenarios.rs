//! End-to-end scenarios through the engine facade.
//!
//! Each test builds an engine over an in-memory libSQL database seeded
//! with a small catalog, unless it needs a file on disk.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;

use counsel_engine::catalog::University;
use counsel_engine::config::EngineConfig;
use counsel_engine::error::{EngineError, UnmetCondition};
use counsel_engine::events::EngineEvent;
use counsel_engine::profile::UserProfile;
use counsel_engine::shortlist::Category;
use counsel_engine::stage::Stage;
use counsel_engine::store::{Database, LibSqlBackend};
use counsel_engine::tasks::templates;
use counsel_engine::CounselingEngine;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

fn catalog() -> Vec<University> {
    vec![
        University::new(1, "Northfield University", "Canada", Some(120), dec!(24000)),
        University::new(2, "Lakeside Institute", "Canada", Some(35), dec!(41000)),
        University::new(3, "Rhine Technical University", "Germany", Some(80), dec!(3000)),
        University::new(4, "Prairie College", "Canada", None, dec!(9000)),
        University::new(5, "Bay State University", "United States", Some(10), dec!(55000)),
        University::new(6, "Harbour University", "Canada", Some(210), dec!(19000)),
    ]
}

async fn seeded(db: &LibSqlBackend) {
    for u in catalog() {
        db.upsert_university(&u).await.unwrap();
    }
}

async fn engine_with(config: EngineConfig) -> (CounselingEngine, Arc<LibSqlBackend>) {
    let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    seeded(&db).await;
    (CounselingEngine::new(db.clone(), db.clone(), config), db)
}

async fn engine() -> CounselingEngine {
    engine_with(EngineConfig::default()).await.0
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
async fn shortlist_pairs_stay_unique() {
    let engine = engine().await;
    let user = engine
        .create_profile(UserProfile::new("unique@example.com"))
        .await
        .unwrap()
        .id;

    engine.shortlist(user, 1, "match").await.unwrap();
    assert!(matches!(
        engine.shortlist(user, 1, "safety").await,
        Err(EngineError::DuplicateEntry { .. })
    ));
    engine.unshortlist(user, 1).await.unwrap();
    engine.shortlist(user, 1, "safety").await.unwrap();
    engine.shortlist(user, 3, "dream").await.unwrap();
    assert!(engine.shortlist(user, 3, "reach").await.is_err());

    let listed = engine.list_shortlisted(user).await.unwrap();
    let mut ids: Vec<_> = listed.iter().map(|r| r.university_id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), listed.len());
    assert_eq!(listed.len(), 2);
    assert_eq!(
        listed.iter().find(|r| r.university_id == 1).unwrap().category,
        Category::Safety
    );
}

#[tokio::test]
async fn lock_without_shortlist_fails() {
    let engine = engine().await;
    let user = engine
        .create_profile(UserProfile::new("nolock@example.com"))
        .await
        .unwrap()
        .id;

    let err = engine.lock(user, 2).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
    assert!(engine.list_locked(user).await.unwrap().is_empty());
    assert!(engine.tasks(user).await.unwrap().is_empty());
}

#[tokio::test]
async fn advance_waits_for_complete_profile() {
    let engine = engine().await;
    let profile = engine
        .create_profile(UserProfile::new("advance@example.com"))
        .await
        .unwrap();

    let err = engine.advance(profile.id).await.unwrap_err();
    match err {
        EngineError::PreconditionNotMet(UnmetCondition::ProfileIncomplete { missing }) => {
            assert!(missing.contains(&"field_of_study".to_string()));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(engine.current_stage(profile.id).await.unwrap(), Stage::Onboarding);

    let mut filled = complete_profile("advance@example.com");
    filled.id = profile.id;
    let updated = engine.update_profile(filled).await.unwrap();
    assert!(updated.profile_complete);

    let state = engine.advance(profile.id).await.unwrap();
    assert_eq!(state.current_stage, Stage::ProfilingComplete);
}

#[tokio::test]
async fn locked_choice_cannot_be_unshortlisted() {
    let engine = engine().await;
    let user = engine
        .create_profile(UserProfile::new("locked@example.com"))
        .await
        .unwrap()
        .id;

    engine.shortlist(user, 3, "match").await.unwrap();
    engine.lock(user, 3).await.unwrap();

    let locked = engine.list_locked(user).await.unwrap();
    assert_eq!(locked.iter().map(|r| r.university_id).collect::<Vec<_>>(), vec![3]);

    let err = engine.unshortlist(user, 3).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidOperation(_)));
    assert_eq!(engine.list_shortlisted(user).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unlock_obsoletes_scoped_tasks_but_keeps_history() {
    let engine = engine().await;
    let user = engine
        .create_profile(UserProfile::new("history@example.com"))
        .await
        .unwrap()
        .id;

    engine.shortlist(user, 2, "reach").await.unwrap();
    engine.lock(user, 2).await.unwrap();

    let scoped: Vec<_> = engine
        .open_tasks(user)
        .await
        .unwrap()
        .filter(|t| t.university_id == Some(2))
        .collect();
    let n = templates::per_university().len();
    assert_eq!(scoped.len(), n);

    let done = engine.complete_task(user, scoped[0].id).await.unwrap();
    assert!(done.completed);

    engine.unlock(user, 2).await.unwrap();

    assert_eq!(
        engine
            .open_tasks(user)
            .await
            .unwrap()
            .filter(|t| t.university_id == Some(2))
            .count(),
        0
    );
    let all = engine.tasks(user).await.unwrap();
    assert_eq!(all.len(), n);
    let kept = all.iter().find(|t| t.id == done.id).unwrap();
    assert!(kept.completed);
    assert!(kept.completed_at.is_some());
    assert_eq!(all.iter().filter(|t| t.obsolete).count(), n - 1);

    // Still shortlisted after unlocking.
    assert_eq!(engine.list_shortlisted(user).await.unwrap().len(), 1);
}

#[tokio::test]
async fn lock_limit_plus_one_changes_nothing() {
    let config = EngineConfig {
        max_locked: 2,
        ..Default::default()
    };
    let (engine, _) = engine_with(config).await;
    let user = engine
        .create_profile(UserProfile::new("limit@example.com"))
        .await
        .unwrap()
        .id;

    for id in [1, 2, 3] {
        engine.shortlist(user, id, "match").await.unwrap();
    }
    engine.lock(user, 1).await.unwrap();
    engine.lock(user, 2).await.unwrap();
    let tasks_before = engine.tasks(user).await.unwrap().len();

    let err = engine.lock(user, 3).await.unwrap_err();
    assert!(matches!(err, EngineError::LockLimitExceeded { max: 2 }));

    let locked: Vec<_> = engine
        .list_locked(user)
        .await
        .unwrap()
        .iter()
        .map(|r| r.university_id)
        .collect();
    assert_eq!(locked, vec![2, 1]);
    assert_eq!(engine.tasks(user).await.unwrap().len(), tasks_before);
    let third = engine
        .list_shortlisted(user)
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.university_id == 3)
        .unwrap();
    assert!(!third.locked);
}

#[tokio::test]
async fn concurrent_locks_respect_the_limit() {
    let config = EngineConfig {
        max_locked: 2,
        ..Default::default()
    };
    let (engine, _) = engine_with(config).await;
    let user = engine
        .create_profile(UserProfile::new("race@example.com"))
        .await
        .unwrap()
        .id;
    for id in [1, 2, 3, 4] {
        engine.shortlist(user, id, "match").await.unwrap();
    }

    let calls = [1, 2, 3, 4].map(|id| engine.lock(user, id));
    let results = tokio::time::timeout(TEST_TIMEOUT, futures::future::join_all(calls))
        .await
        .expect("locks hung");

    let ok = results.iter().filter(|r| r.is_ok()).count();
    let limited = results
        .iter()
        .filter(|r| matches!(r, Err(EngineError::LockLimitExceeded { .. })))
        .count();
    assert_eq!(ok, 2);
    assert_eq!(limited, 2);
    assert_eq!(engine.list_locked(user).await.unwrap().len(), 2);
}

#[tokio::test]
async fn different_users_do_not_block_each_other() {
    let engine = engine().await;
    let a = engine
        .create_profile(UserProfile::new("a@example.com"))
        .await
        .unwrap()
        .id;
    let b = engine
        .create_profile(UserProfile::new("b@example.com"))
        .await
        .unwrap()
        .id;

    let _held = engine.scope(a).await.unwrap();
    let shortlisted = tokio::time::timeout(TEST_TIMEOUT, engine.shortlist(b, 1, "safety"))
        .await
        .expect("other user blocked");
    assert!(shortlisted.is_ok());
}

#[tokio::test]
async fn busy_scope_is_a_retryable_conflict() {
    let config = EngineConfig {
        scope_wait: Duration::from_millis(50),
        ..Default::default()
    };
    let (engine, _) = engine_with(config).await;
    let user = engine
        .create_profile(UserProfile::new("busy@example.com"))
        .await
        .unwrap()
        .id;
    engine.shortlist(user, 1, "match").await.unwrap();

    let held = engine.scope(user).await.unwrap();
    let err = engine.lock(user, 1).await.unwrap_err();
    assert!(matches!(err, EngineError::Conflict { .. }));
    assert!(err.is_retryable());
    assert!(engine.list_locked(user).await.unwrap().is_empty());

    drop(held);
    engine.lock(user, 1).await.unwrap();
}

#[tokio::test]
async fn full_journey_emits_events() {
    let engine = engine().await;
    let mut events = engine.subscribe();
    let user = engine
        .create_profile(complete_profile("journey@example.com"))
        .await
        .unwrap()
        .id;

    engine.advance(user).await.unwrap();
    engine.shortlist(user, 3, "target").await.unwrap();
    engine.shortlist(user, 1, "safe").await.unwrap();
    engine.advance(user).await.unwrap();
    engine.lock(user, 3).await.unwrap();
    engine.advance(user).await.unwrap();
    assert_eq!(engine.current_stage(user).await.unwrap(), Stage::Locked);

    let locked_stage: Vec<_> = engine
        .open_tasks(user)
        .await
        .unwrap()
        .filter(|t| t.stage == Stage::Locked)
        .collect();
    assert_eq!(locked_stage.len(), templates::for_stage(Stage::Locked).len());
    for task in locked_stage {
        engine.complete_task(user, task.id).await.unwrap();
    }
    engine.advance(user).await.unwrap();

    let scoped: Vec<_> = engine
        .open_tasks(user)
        .await
        .unwrap()
        .filter(|t| t.university_id.is_some())
        .collect();
    for task in scoped {
        engine.complete_task(user, task.id).await.unwrap();
    }
    let state = engine.advance(user).await.unwrap();
    assert_eq!(state.current_stage, Stage::Decision);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(
        seen.first(),
        Some(&EngineEvent::StageAdvanced {
            user_id: user,
            from: Stage::Onboarding,
            to: Stage::ProfilingComplete,
        })
    );
    assert!(seen.contains(&EngineEvent::UniversityLocked {
        user_id: user,
        university_id: 3,
    }));
    assert_eq!(
        seen.last(),
        Some(&EngineEvent::StageAdvanced {
            user_id: user,
            from: Stage::InProgress,
            to: Stage::Decision,
        })
    );
}

#[tokio::test]
async fn regress_after_unlocking_everything() {
    let engine = engine().await;
    let user = engine
        .create_profile(complete_profile("regress@example.com"))
        .await
        .unwrap()
        .id;
    engine.advance(user).await.unwrap();
    engine.shortlist(user, 6, "safety").await.unwrap();
    engine.advance(user).await.unwrap();
    engine.lock(user, 6).await.unwrap();
    engine.advance(user).await.unwrap();

    engine.unlock(user, 6).await.unwrap();
    let state = engine.regress(user, Stage::Shortlisting).await.unwrap();
    assert_eq!(state.current_stage, Stage::Shortlisting);

    let open: Vec<_> = engine.open_tasks(user).await.unwrap().collect();
    assert!(open.iter().all(|t| t.stage <= Stage::Shortlisting));
    assert!(open.iter().all(|t| t.university_id.is_none()));

    let err = engine.regress(user, Stage::Locked).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidOperation(_)));
}

#[tokio::test]
async fn deleting_a_profile_removes_everything_it_owns() {
    let engine = engine().await;
    let user = engine
        .create_profile(UserProfile::new("gone@example.com"))
        .await
        .unwrap()
        .id;
    engine.shortlist(user, 2, "reach").await.unwrap();
    engine.lock(user, 2).await.unwrap();

    engine.delete_profile(user).await.unwrap();

    assert!(matches!(engine.profile(user).await, Err(EngineError::NotFound { .. })));
    assert!(matches!(
        engine.current_stage(user).await,
        Err(EngineError::NotFound { .. })
    ));
    assert!(engine.tasks(user).await.unwrap().is_empty());
    assert!(engine.list_shortlisted(user).await.unwrap().is_empty());
    assert!(matches!(
        engine.delete_profile(user).await,
        Err(EngineError::NotFound { .. })
    ));
}

#[tokio::test]
async fn withdrawn_university_is_archived_not_deleted() {
    let engine = engine().await;
    let user = engine
        .create_profile(UserProfile::new("withdrawn@example.com"))
        .await
        .unwrap()
        .id;
    engine.shortlist(user, 2, "reach").await.unwrap();
    engine.lock(user, 2).await.unwrap();
    let first = engine.open_tasks(user).await.unwrap().next().unwrap();
    engine.complete_task(user, first.id).await.unwrap();

    engine.withdraw_university(2).await.unwrap();

    assert!(matches!(
        engine.university(2).await,
        Err(EngineError::NotFound { .. })
    ));
    assert!(engine.list_shortlisted(user).await.unwrap().is_empty());
    assert!(engine.list_locked(user).await.unwrap().is_empty());
    assert_eq!(engine.open_tasks(user).await.unwrap().count(), 0);

    let history = engine.tasks(user).await.unwrap();
    assert_eq!(history.len(), templates::per_university().len());
    assert!(history.iter().all(|t| t.university_id == Some(2)));
    assert!(history.iter().any(|t| t.id == first.id && t.completed));

    assert!(matches!(
        engine.shortlist(user, 2, "reach").await,
        Err(EngineError::NotFound { .. })
    ));
    assert!(matches!(
        engine.withdraw_university(2).await,
        Err(EngineError::NotFound { .. })
    ));
}

#[tokio::test]
async fn filtering_and_suggestions_follow_the_profile() {
    let engine = engine().await;
    let user = engine
        .create_profile(complete_profile("filter@example.com"))
        .await
        .unwrap()
        .id;

    // Budget 30000 widened to 36000; Canada and Germany only.
    let ids: Vec<_> = engine
        .filter_for(user)
        .await
        .unwrap()
        .iter()
        .map(|u| u.id)
        .collect();
    assert_eq!(ids, vec![3, 1, 6, 4]);

    let suggestions = engine.suggestions(user).await.unwrap();
    assert!(suggestions.reach.is_empty());
    assert_eq!(
        suggestions.match_.iter().map(|s| s.university.id).collect::<Vec<_>>(),
        vec![3]
    );
    assert_eq!(suggestions.safety.len(), 3);
    assert!(suggestions.safety.windows(2).all(|w| w[0].fit >= w[1].fit));
}

#[tokio::test]
async fn dashboard_snapshot() {
    let engine = engine().await;
    let user = engine
        .create_profile(complete_profile("dash@example.com"))
        .await
        .unwrap()
        .id;
    engine.advance(user).await.unwrap();
    engine.shortlist(user, 1, "safety").await.unwrap();
    engine.shortlist(user, 2, "reach").await.unwrap();
    engine.lock(user, 2).await.unwrap();

    let dash = engine.dashboard(user).await.unwrap();
    assert_eq!(dash.stage, Stage::ProfilingComplete);
    assert_eq!(
        dash.shortlisted.iter().map(|r| r.university_id).collect::<Vec<_>>(),
        vec![2, 1]
    );
    assert_eq!(dash.balance.reach, 1);
    assert_eq!(dash.balance.safety, 1);
    assert!(dash.strength.percentage > 0);
    assert!(dash.open_tasks.iter().all(|t| !t.completed && !t.obsolete));
    assert_eq!(
        dash.open_tasks.len(),
        templates::for_stage(Stage::ProfilingComplete).len() + templates::per_university().len()
    );

    let json = serde_json::to_value(&dash).unwrap();
    assert_eq!(json["stage"], "PROFILING_COMPLETE");
}

#[tokio::test]
async fn state_survives_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("counsel.db");
    let config = EngineConfig {
        db_path: path.clone(),
        ..Default::default()
    };

    let user = {
        let db = Arc::new(LibSqlBackend::new_local(&path).await.unwrap());
        seeded(&db).await;
        let engine = CounselingEngine::new(db.clone(), db, config.clone());
        let user = engine
            .create_profile(complete_profile("disk@example.com"))
            .await
            .unwrap()
            .id;
        engine.advance(user).await.unwrap();
        engine.shortlist(user, 3, "match").await.unwrap();
        user
    };

    let db = Arc::new(LibSqlBackend::new_local(&path).await.unwrap());
    let engine = CounselingEngine::new(db.clone(), db, config);
    assert_eq!(
        engine.current_stage(user).await.unwrap(),
        Stage::ProfilingComplete
    );
    assert_eq!(engine.list_shortlisted(user).await.unwrap().len(), 1);
    assert_eq!(
        engine.get_or_create_profile("DISK@example.com").await.unwrap().id,
        user
    );
}
