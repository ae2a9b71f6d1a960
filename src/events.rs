//! Engine events: stage transitions and lock changes.
//!
//! Events are delivered synchronously to an [`EventSink`] while the caller
//! still holds the user's scope, so the sink's writes land in the same
//! serialized sequence as the triggering mutation.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::catalog::UniversityId;
use crate::error::EngineError;
use crate::scope::UserScope;
use crate::stage::Stage;

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Something that happened to one user's journey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    StageAdvanced {
        user_id: Uuid,
        from: Stage,
        to: Stage,
    },
    StageRegressed {
        user_id: Uuid,
        from: Stage,
        to: Stage,
    },
    UniversityLocked {
        user_id: Uuid,
        university_id: UniversityId,
    },
    UniversityUnlocked {
        user_id: Uuid,
        university_id: UniversityId,
    },
}

impl EngineEvent {
    pub fn user_id(&self) -> Uuid {
        match self {
            Self::StageAdvanced { user_id, .. }
            | Self::StageRegressed { user_id, .. }
            | Self::UniversityLocked { user_id, .. }
            | Self::UniversityUnlocked { user_id, .. } => *user_id,
        }
    }
}

/// Consumer of engine events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Handle `event` inside the caller's scope. Errors propagate to the
    /// caller of the triggering operation.
    async fn deliver(&self, scope: &UserScope, event: &EngineEvent) -> Result<(), EngineError>;
}

/// Sink that drops everything.
pub struct NullSink;

#[async_trait]
impl EventSink for NullSink {
    async fn deliver(&self, _scope: &UserScope, _event: &EngineEvent) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Wraps a synchronous sink and fans delivered events out to async subscribers.
///
/// Subscribers only see an event after the inner sink has handled it.
pub struct BroadcastSink {
    inner: Arc<dyn EventSink>,
    tx: broadcast::Sender<EngineEvent>,
}

impl BroadcastSink {
    pub fn new(inner: Arc<dyn EventSink>) -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Self { inner, tx }
    }

    /// Subscribe to delivered events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl EventSink for BroadcastSink {
    async fn deliver(&self, scope: &UserScope, event: &EngineEvent) -> Result<(), EngineError> {
        self.inner.deliver(scope, event).await?;
        debug!(user_id = %event.user_id(), ?event, "Event delivered");
        // Ok if no receivers are listening
        let _ = self.tx.send(event.clone());
        Ok(())
    }
}
