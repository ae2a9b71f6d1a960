//! Task orchestrator: keeps a user's task set in line with their stage
//! and locked universities.
//!
//! Tasks are never hard-deleted. When their stage or lock no longer holds
//! they are flagged obsolete; when it holds again they are revived with
//! their completion state intact.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::model::{Task, TaskTemplate};
use super::templates::{self, UNIVERSITY_TASK_STAGE};
use crate::catalog::UniversityId;
use crate::error::EngineError;
use crate::events::{EngineEvent, EventSink};
use crate::scope::UserScope;
use crate::stage::Stage;
use crate::store::Database;

/// Lazily filtered view over a user's open tasks, in creation order.
pub struct OpenTasks {
    inner: std::vec::IntoIter<Task>,
}

impl Iterator for OpenTasks {
    type Item = Task;

    fn next(&mut self) -> Option<Task> {
        self.inner.by_ref().find(Task::is_open)
    }
}

/// Task writes made while handling one event, so a failure part-way can
/// put every touched task back.
#[derive(Default)]
struct Journal {
    steps: Vec<Applied>,
}

enum Applied {
    Created(Uuid),
    /// Prior state of a revived or retired task.
    Flipped(Task),
}

pub struct TaskOrchestrator {
    db: Arc<dyn Database>,
}

impl TaskOrchestrator {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Create the stage-generic tasks of `stage` that the user lacks.
    /// Returns how many were created or revived.
    pub async fn on_stage_entered(
        &self,
        scope: &UserScope,
        stage: Stage,
    ) -> Result<usize, EngineError> {
        let mut journal = Journal::default();
        let result = self.stage_entered(&mut journal, scope, stage).await;
        self.settle(journal, result).await
    }

    /// Create the per-university tasks for a newly locked university.
    pub async fn on_university_locked(
        &self,
        scope: &UserScope,
        university_id: UniversityId,
    ) -> Result<usize, EngineError> {
        let mut journal = Journal::default();
        let result = self.university_locked(&mut journal, scope, university_id).await;
        self.settle(journal, result).await
    }

    /// Retire the open tasks scoped to an unlocked university.
    /// Completed ones stay as they are.
    pub async fn on_university_unlocked(
        &self,
        scope: &UserScope,
        university_id: UniversityId,
    ) -> Result<usize, EngineError> {
        let mut journal = Journal::default();
        let result = self.university_unlocked(&mut journal, scope, university_id).await;
        self.settle(journal, result).await
    }

    /// Retire the open stage-generic tasks of `from_stage` and every later stage.
    ///
    /// `from_stage` is the earliest stage the user no longer occupies.
    pub async fn on_stage_regressed(
        &self,
        scope: &UserScope,
        from_stage: Stage,
    ) -> Result<usize, EngineError> {
        let mut journal = Journal::default();
        let result = self.stage_regressed(&mut journal, scope, from_stage).await;
        self.settle(journal, result).await
    }

    /// Mark a task completed.
    ///
    /// Fails with `NotFound` when the task is missing or owned by someone
    /// else, `AlreadyCompleted` on a second call, and `InvalidOperation`
    /// for obsolete tasks.
    pub async fn complete(&self, scope: &UserScope, task_id: Uuid) -> Result<Task, EngineError> {
        let mut task = match self.db.get_task(task_id).await? {
            Some(t) if t.user_id == scope.user_id() => t,
            _ => return Err(EngineError::not_found("task", task_id)),
        };

        if task.completed {
            return Err(EngineError::AlreadyCompleted { id: task_id });
        }
        if task.obsolete {
            return Err(EngineError::InvalidOperation(format!(
                "task {task_id} is obsolete and can no longer be completed"
            )));
        }

        task.mark_completed();
        self.db.update_task(&task).await?;
        info!(user_id = %scope.user_id(), task_id = %task_id, title = %task.title, "Task completed");
        Ok(task)
    }

    /// Incomplete, non-obsolete tasks of a user, oldest first.
    pub async fn list_open(&self, user_id: Uuid) -> Result<OpenTasks, EngineError> {
        let tasks = self.db.list_tasks(user_id).await?;
        Ok(OpenTasks {
            inner: tasks.into_iter(),
        })
    }

    /// Every task of a user, history included.
    pub async fn list_tasks(&self, user_id: Uuid) -> Result<Vec<Task>, EngineError> {
        Ok(self.db.list_tasks(user_id).await?)
    }

    async fn stage_entered(
        &self,
        journal: &mut Journal,
        scope: &UserScope,
        stage: Stage,
    ) -> Result<usize, EngineError> {
        let changed = self
            .ensure(journal, scope.user_id(), templates::for_stage(stage), stage, None)
            .await?;
        if changed > 0 {
            info!(user_id = %scope.user_id(), %stage, changed, "Stage tasks generated");
        }
        Ok(changed)
    }

    async fn university_locked(
        &self,
        journal: &mut Journal,
        scope: &UserScope,
        university_id: UniversityId,
    ) -> Result<usize, EngineError> {
        let changed = self
            .ensure(
                journal,
                scope.user_id(),
                templates::per_university(),
                UNIVERSITY_TASK_STAGE,
                Some(university_id),
            )
            .await?;
        info!(user_id = %scope.user_id(), university_id, changed, "University tasks generated");
        Ok(changed)
    }

    async fn university_unlocked(
        &self,
        journal: &mut Journal,
        scope: &UserScope,
        university_id: UniversityId,
    ) -> Result<usize, EngineError> {
        let retired = self
            .retire(journal, scope.user_id(), |t| t.university_id == Some(university_id))
            .await?;
        info!(user_id = %scope.user_id(), university_id, retired, "University tasks retired");
        Ok(retired)
    }

    async fn stage_regressed(
        &self,
        journal: &mut Journal,
        scope: &UserScope,
        from_stage: Stage,
    ) -> Result<usize, EngineError> {
        let retired = self
            .retire(journal, scope.user_id(), |t| {
                !t.is_university_scoped() && t.stage >= from_stage
            })
            .await?;
        info!(user_id = %scope.user_id(), %from_stage, retired, "Stage tasks retired");
        Ok(retired)
    }

    async fn ensure(
        &self,
        journal: &mut Journal,
        user_id: Uuid,
        templates: &[TaskTemplate],
        stage: Stage,
        university_id: Option<UniversityId>,
    ) -> Result<usize, EngineError> {
        if templates.is_empty() {
            return Ok(0);
        }

        let existing = self.db.list_tasks(user_id).await?;
        let mut changed = 0;

        for template in templates {
            let found = existing
                .iter()
                .find(|t| t.is_instance_of(template.key, stage, university_id));
            match found {
                Some(task) if task.obsolete => {
                    let mut revived = task.clone();
                    revived.set_obsolete(false);
                    self.db.update_task(&revived).await?;
                    journal.steps.push(Applied::Flipped(task.clone()));
                    debug!(user_id = %user_id, key = template.key, "Revived task");
                    changed += 1;
                }
                Some(_) => {}
                None => {
                    let task = Task::from_template(user_id, template, stage, university_id);
                    self.db.insert_task(&task).await?;
                    journal.steps.push(Applied::Created(task.id));
                    debug!(user_id = %user_id, key = template.key, task_id = %task.id, "Created task");
                    changed += 1;
                }
            }
        }

        Ok(changed)
    }

    async fn retire(
        &self,
        journal: &mut Journal,
        user_id: Uuid,
        selects: impl Fn(&Task) -> bool + Send,
    ) -> Result<usize, EngineError> {
        let mut retired = 0;
        for task in self.db.list_tasks(user_id).await? {
            if task.is_open() && selects(&task) {
                let mut obsolete = task.clone();
                obsolete.set_obsolete(true);
                self.db.update_task(&obsolete).await?;
                journal.steps.push(Applied::Flipped(task));
                retired += 1;
            }
        }
        Ok(retired)
    }

    async fn apply(
        &self,
        journal: &mut Journal,
        scope: &UserScope,
        event: &EngineEvent,
    ) -> Result<(), EngineError> {
        match event {
            EngineEvent::StageAdvanced { to, .. } => {
                self.stage_entered(journal, scope, *to).await?;
            }
            EngineEvent::StageRegressed { to, .. } => {
                if let Some(first_abandoned) = to.next() {
                    self.stage_regressed(journal, scope, first_abandoned).await?;
                }
                self.stage_entered(journal, scope, *to).await?;
            }
            EngineEvent::UniversityLocked { university_id, .. } => {
                self.university_locked(journal, scope, *university_id).await?;
            }
            EngineEvent::UniversityUnlocked { university_id, .. } => {
                self.university_unlocked(journal, scope, *university_id).await?;
            }
        }
        Ok(())
    }

    /// Pass `result` through, undoing the journal first if it failed.
    async fn settle<T>(
        &self,
        journal: Journal,
        result: Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        if result.is_err() {
            self.undo(journal).await;
        }
        result
    }

    /// Revert journaled writes, newest first. Steps that fail are logged
    /// and skipped so the rest still get reverted.
    async fn undo(&self, journal: Journal) {
        let steps = journal.steps.len();
        for step in journal.steps.into_iter().rev() {
            let reverted = match &step {
                Applied::Created(id) => self.db.delete_task(*id).await.map(|_| ()),
                Applied::Flipped(prior) => self.db.update_task(prior).await,
            };
            if let Err(e) = reverted {
                warn!(error = %e, "Task rollback step failed");
            }
        }
        if steps > 0 {
            warn!(steps, "Task changes rolled back");
        }
    }
}

/// Open stage-generic tasks owned by `stage`.
pub fn count_open_stage_tasks(tasks: &[Task], stage: Stage) -> usize {
    tasks
        .iter()
        .filter(|t| t.is_open() && !t.is_university_scoped() && t.stage == stage)
        .count()
}

/// Open tasks scoped to any of `locked`.
pub fn count_open_university_tasks(tasks: &[Task], locked: &[UniversityId]) -> usize {
    tasks
        .iter()
        .filter(|t| t.is_open() && t.university_id.is_some_and(|id| locked.contains(&id)))
        .count()
}

#[async_trait]
impl EventSink for TaskOrchestrator {
    /// Apply the task changes `event` calls for. Either all of them land or,
    /// on error, none do.
    async fn deliver(&self, scope: &UserScope, event: &EngineEvent) -> Result<(), EngineError> {
        if event.user_id() != scope.user_id() {
            return Err(EngineError::InvalidOperation(format!(
                "event for user {} delivered under scope of {}",
                event.user_id(),
                scope.user_id()
            )));
        }

        let mut journal = Journal::default();
        let result = self.apply(&mut journal, scope, event).await;
        self.settle(journal, result).await
    }
}
