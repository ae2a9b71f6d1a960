//! Stage state machine: validates and applies a user's stage transitions.
//!
//! A failed check writes nothing. A successful transition is committed,
//! then delivered to the event sink while the caller still holds the
//! user's scope; if delivery fails the stage is put back.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::state::{Stage, StageFacts, UserState};
use crate::error::EngineError;
use crate::events::{EngineEvent, EventSink};
use crate::profile::ProfileStore;
use crate::scope::UserScope;
use crate::shortlist::ShortlistManager;
use crate::store::Database;
use crate::tasks::{TaskOrchestrator, count_open_stage_tasks, count_open_university_tasks};

pub struct StageMachine {
    db: Arc<dyn Database>,
    profiles: Arc<ProfileStore>,
    shortlist: Arc<ShortlistManager>,
    tasks: Arc<TaskOrchestrator>,
    events: Arc<dyn EventSink>,
}

impl StageMachine {
    pub fn new(
        db: Arc<dyn Database>,
        profiles: Arc<ProfileStore>,
        shortlist: Arc<ShortlistManager>,
        tasks: Arc<TaskOrchestrator>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            db,
            profiles,
            shortlist,
            tasks,
            events,
        }
    }

    pub async fn state(&self, user_id: Uuid) -> Result<UserState, EngineError> {
        self.db
            .get_user_state(user_id)
            .await?
            .ok_or_else(|| EngineError::not_found("user state", user_id))
    }

    pub async fn current_stage(&self, user_id: Uuid) -> Result<Stage, EngineError> {
        Ok(self.state(user_id).await?.current_stage)
    }

    /// Gather what the entry checks look at.
    pub async fn facts(&self, user_id: Uuid) -> Result<StageFacts, EngineError> {
        let missing_profile_fields = self
            .profiles
            .missing_fields(user_id)
            .await?
            .into_iter()
            .map(String::from)
            .collect();
        let summary = self.shortlist.summary(user_id).await?;
        let tasks = self.tasks.list_tasks(user_id).await?;

        Ok(StageFacts {
            missing_profile_fields,
            shortlisted: summary.shortlisted,
            locked: summary.locked.len(),
            max_locked: self.shortlist.max_locked(),
            open_locked_stage_tasks: count_open_stage_tasks(&tasks, Stage::Locked),
            open_university_tasks: count_open_university_tasks(&tasks, &summary.locked),
        })
    }

    /// Move the user to the next stage if its entry check passes.
    pub async fn advance(&self, scope: &UserScope) -> Result<UserState, EngineError> {
        let user_id = scope.user_id();
        let mut state = self.state(user_id).await?;
        let from = state.current_stage;

        let Some(to) = from.next() else {
            return Err(EngineError::InvalidOperation(format!(
                "{from} is the final stage"
            )));
        };

        let facts = self.facts(user_id).await?;
        if let Err(unmet) = to.entry_check(&facts) {
            warn!(user_id = %user_id, %from, %to, reason = %unmet, "Stage advance blocked");
            return Err(EngineError::PreconditionNotMet(unmet));
        }

        state.enter(to);
        self.commit(scope, &mut state, from, EngineEvent::StageAdvanced { user_id, from, to })
            .await?;
        info!(user_id = %user_id, %from, %to, "Stage advanced");
        Ok(state)
    }

    /// Move the user back to an earlier stage, retiring the tasks of the
    /// stages left behind.
    pub async fn regress(&self, scope: &UserScope, to: Stage) -> Result<UserState, EngineError> {
        let user_id = scope.user_id();
        let mut state = self.state(user_id).await?;
        let from = state.current_stage;

        if to >= from {
            return Err(EngineError::InvalidOperation(format!(
                "cannot regress from {from} to {to}"
            )));
        }

        state.enter(to);
        self.commit(scope, &mut state, from, EngineEvent::StageRegressed { user_id, from, to })
            .await?;
        info!(user_id = %user_id, %from, %to, "Stage regressed");
        Ok(state)
    }

    async fn commit(
        &self,
        scope: &UserScope,
        state: &mut UserState,
        previous: Stage,
        event: EngineEvent,
    ) -> Result<(), EngineError> {
        self.db.update_user_state(state).await?;
        if let Err(e) = self.events.deliver(scope, &event).await {
            warn!(user_id = %state.user_id, error = %e, "Transition rolled back");
            state.enter(previous);
            self.db.update_user_state(state).await?;
            return Err(e);
        }
        Ok(())
    }
}
