//! Counsel Engine: stage-driven study-abroad counseling core.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod profile;
pub mod scope;
pub mod shortlist;
pub mod stage;
pub mod store;
pub mod tasks;

pub use engine::{CounselingEngine, Dashboard};
pub use error::{EngineError, Result};
