//! Task data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::UniversityId;
use crate::stage::Stage;

/// A unit of work surfaced to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique ID.
    pub id: Uuid,
    /// Owner of this task.
    pub user_id: Uuid,
    /// Short title.
    pub title: String,
    /// Longer guidance text.
    pub description: String,
    /// Stage that owns this task.
    pub stage: Stage,
    /// `None` for stage-generic tasks, the locked university otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub university_id: Option<UniversityId>,
    /// Stable identifier of the template this task was generated from.
    pub template_key: String,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Retired because its stage or lock no longer holds. Kept for history.
    pub obsolete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Instantiate `template` for `user_id`.
    pub fn from_template(
        user_id: Uuid,
        template: &TaskTemplate,
        stage: Stage,
        university_id: Option<UniversityId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            title: template.title.to_string(),
            description: template.description.to_string(),
            stage,
            university_id,
            template_key: template.key.to_string(),
            completed: false,
            completed_at: None,
            obsolete: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Neither completed nor obsolete.
    pub fn is_open(&self) -> bool {
        !self.completed && !self.obsolete
    }

    pub fn is_university_scoped(&self) -> bool {
        self.university_id.is_some()
    }

    /// Whether this task was generated from `key` for the given scope.
    pub fn is_instance_of(
        &self,
        key: &str,
        stage: Stage,
        university_id: Option<UniversityId>,
    ) -> bool {
        self.template_key == key && self.stage == stage && self.university_id == university_id
    }

    pub fn mark_completed(&mut self) {
        let now = Utc::now();
        self.completed = true;
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    pub fn set_obsolete(&mut self, obsolete: bool) {
        self.obsolete = obsolete;
        self.updated_at = Utc::now();
    }
}

/// Static description of a generated task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskTemplate {
    pub key: &'static str,
    pub title: &'static str,
    pub description: &'static str,
}
