//! Tasks: stage-generic and university-scoped units of work.

pub mod model;
pub mod orchestrator;
pub mod templates;

pub use model::{Task, TaskTemplate};
pub use orchestrator::{
    OpenTasks, TaskOrchestrator, count_open_stage_tasks, count_open_university_tasks,
};
