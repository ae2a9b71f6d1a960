//! Per-user counseling stage and its transitions.

pub mod machine;
pub mod state;

pub use machine::StageMachine;
pub use state::{Stage, StageFacts, UserState};
