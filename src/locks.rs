//! Per-session lock registry.
//!
//! One mutual-exclusion primitive per session id, created on demand under
//! a short-held registry lock. Exactly one mutator proceeds past an
//! acquire for a given session at a time; unrelated sessions never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as SessionMutex, OwnedMutexGuard};
use tracing::{debug, instrument};

use crate::error::EngineError;
use crate::session::SessionId;

/// Guard proving exclusive access to one session for one operation.
pub type SessionGuard = OwnedMutexGuard<()>;

/// Process-wide map from session id to its lock.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<SessionId, Arc<SessionMutex<()>>>>,
}

impl LockRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the singleton lock for a session, creating it if absent.
    fn session_lock(&self, session_id: &str) -> Arc<SessionMutex<()>> {
        let mut locks = self.locks.lock().expect("lock registry poisoned");
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(SessionMutex::new(())))
            .clone()
    }

    /// Blocking acquire, used by the reaper and the computer-move task:
    /// they are not latency-sensitive but must eventually run.
    #[instrument(skip(self))]
    pub async fn acquire(&self, session_id: &str) -> SessionGuard {
        self.session_lock(session_id).lock_owned().await
    }

    /// Non-blocking acquire for direct user moves.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Busy`] if another mutation for this session
    /// is mid-flight. The rejection is terminal for the request; callers
    /// must not retry internally.
    #[instrument(skip(self))]
    pub fn try_acquire(&self, session_id: &str) -> Result<SessionGuard, EngineError> {
        self.session_lock(session_id)
            .try_lock_owned()
            .map_err(|_| {
                debug!(session_id, "session lock contended");
                EngineError::Busy
            })
    }

    /// Drops the lock entry for a deleted session so the registry stays
    /// bounded by live sessions. A holder keeps its guard alive through
    /// the `Arc`; future acquires would mint a fresh lock, which is safe
    /// because the session row is already gone.
    #[instrument(skip(self))]
    pub fn evict(&self, session_id: &str) {
        let mut locks = self.locks.lock().expect("lock registry poisoned");
        if locks.remove(session_id).is_some() {
            debug!(session_id, "evicted session lock");
        }
    }

    /// Number of registered locks.
    pub fn len(&self) -> usize {
        self.locks.lock().expect("lock registry poisoned").len()
    }

    /// True if no locks are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_id_returns_same_lock() {
        let registry = LockRegistry::new();
        let guard = registry.acquire("abc").await;
        // Second acquire of the same session must contend.
        assert!(registry.try_acquire("abc").is_err());
        drop(guard);
        assert!(registry.try_acquire("abc").is_ok());
    }

    #[tokio::test]
    async fn test_distinct_sessions_do_not_contend() {
        let registry = LockRegistry::new();
        let _guard = registry.acquire("abc").await;
        assert!(registry.try_acquire("def").is_ok());
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_try_acquire_is_terminal_not_queued() {
        let registry = LockRegistry::new();
        let guard = registry.acquire("abc").await;
        let busy = registry.try_acquire("abc");
        assert!(matches!(busy, Err(EngineError::Busy)));
        drop(guard);
    }

    #[tokio::test]
    async fn test_evict_removes_entry() {
        let registry = LockRegistry::new();
        drop(registry.acquire("abc").await);
        assert_eq!(registry.len(), 1);
        registry.evict("abc");
        assert!(registry.is_empty());
    }
}
