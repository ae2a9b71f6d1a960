//! Error types for the counseling engine.

use std::time::Duration;

use uuid::Uuid;

use crate::stage::Stage;

/// Top-level error type for the binary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
///
/// These are infrastructure failures, never domain rejections.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DatabaseError {
    /// Classify a libSQL error raised by a write statement.
    pub(crate) fn from_write(op: &str, err: libsql::Error) -> Self {
        let msg = err.to_string();
        if msg.contains("UNIQUE constraint failed") || msg.contains("FOREIGN KEY constraint failed")
        {
            Self::Constraint(format!("{op}: {msg}"))
        } else {
            Self::Query(format!("{op}: {msg}"))
        }
    }
}

/// The specific condition that blocked a stage transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnmetCondition {
    /// Required profile fields are still empty.
    ProfileIncomplete { missing: Vec<String> },
    /// No university has been shortlisted yet.
    NothingShortlisted,
    /// The number of locked universities is outside `1..=max`.
    LockCountOutOfRange { locked: usize, max: usize },
    /// Stage-generic tasks of `stage` are still open.
    StageTasksOpen { stage: Stage, remaining: usize },
    /// University-scoped tasks of locked universities are still open.
    UniversityTasksOpen { remaining: usize },
}

impl std::fmt::Display for UnmetCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProfileIncomplete { missing } => {
                write!(f, "complete your profile first (missing: {})", missing.join(", "))
            }
            Self::NothingShortlisted => write!(f, "shortlist at least one university"),
            Self::LockCountOutOfRange { locked, max } => {
                write!(f, "lock between 1 and {max} universities ({locked} locked)")
            }
            Self::StageTasksOpen { stage, remaining } => {
                write!(f, "{remaining} task(s) for stage {stage} are still open")
            }
            Self::UniversityTasksOpen { remaining } => {
                write!(f, "{remaining} application task(s) are still open")
            }
        }
    }
}

/// Domain errors surfaced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Duplicate {entity}: {key}")]
    DuplicateEntry { entity: &'static str, key: String },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Task {id} is already completed")]
    AlreadyCompleted { id: Uuid },

    #[error("Cannot advance: {0}")]
    PreconditionNotMet(UnmetCondition),

    #[error("Lock limit of {max} universities reached")]
    LockLimitExceeded { max: usize },

    #[error("User {user_id} is busy, retry after {waited:?}")]
    Conflict { user_id: Uuid, waited: Duration },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl EngineError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether the caller may retry the operation against fresh state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
