//! Per-user serialization scope.
//!
//! Every mutating engine operation runs while holding the acting user's
//! [`UserScope`]. Operations for different users never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::EngineError;

type Registry = Arc<Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>>;

/// Hands out exclusive per-user scopes.
///
/// An entry exists only while some scope for that user is held or awaited.
#[derive(Default)]
pub struct UserLocks {
    locks: Registry,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the scope for `user_id`, waiting at most `wait`.
    ///
    /// Fails with [`EngineError::Conflict`] if another operation for the
    /// same user holds the scope for longer than `wait`.
    pub async fn acquire(&self, user_id: Uuid, wait: Duration) -> Result<UserScope, EngineError> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(locks.entry(user_id).or_default())
        };

        let acquired = tokio::time::timeout(wait, lock.lock_owned()).await;
        match acquired {
            Ok(guard) => {
                debug!(user_id = %user_id, "User scope acquired");
                Ok(UserScope {
                    user_id,
                    guard: Some(guard),
                    registry: Arc::clone(&self.locks),
                })
            }
            Err(_) => {
                // The timed-out wait has given up its handle.
                release(&self.locks, user_id, 1);
                warn!(user_id = %user_id, waited = ?wait, "User scope busy");
                Err(EngineError::Conflict {
                    user_id,
                    waited: wait,
                })
            }
        }
    }

    #[cfg(test)]
    fn active(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Drop the entry for `user_id` once at most `held` handles, the
/// registry's own included, still reference its mutex.
fn release(registry: &Registry, user_id: Uuid, held: usize) {
    let mut locks = registry.lock().unwrap_or_else(|e| e.into_inner());
    if locks
        .get(&user_id)
        .is_some_and(|lock| Arc::strong_count(lock) <= held)
    {
        locks.remove(&user_id);
    }
}

/// Proof that the holder has exclusive access to one user's state.
pub struct UserScope {
    user_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
    registry: Registry,
}

impl UserScope {
    /// The user this scope belongs to.
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }
}

impl Drop for UserScope {
    fn drop(&mut self) {
        // Map entry plus our guard; any further reference is a waiter that
        // must find the same mutex.
        release(&self.registry, self.user_id, 2);
        self.guard.take();
    }
}

impl std::fmt::Debug for UserScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserScope")
            .field("user_id", &self.user_id)
            .finish()
    }
}
