//! Per-session clarification state, keyed by session id.
//!
//! The outer map lock is held only to find or insert an entry. Each
//! session's state sits behind its own async mutex, held for the whole of
//! one pipeline run, so a session has one writer at a time while other
//! sessions proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tellr_config::ClarificationConfig;
use tokio::sync::Mutex as AsyncMutex;

use crate::clarification::ClarificationManager;

pub type SessionHandle = Arc<AsyncMutex<ClarificationManager>>;

pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionHandle>>,
    config: ClarificationConfig,
}

impl SessionStore {
    #[must_use]
    pub fn new(config: ClarificationConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// The session's state, created `Idle` on first use.
    #[must_use]
    pub fn get_or_create(&self, session_id: &str) -> SessionHandle {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(sessions.entry(session_id.to_string()).or_insert_with(|| {
            tracing::debug!(session_id, "session created");
            Arc::new(AsyncMutex::new(ClarificationManager::new(
                self.config.max_rounds,
                self.config.context_window,
            )))
        }))
    }

    /// Drop a session. Returns whether it existed.
    pub fn remove(&self, session_id: &str) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id)
            .is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = SessionStore::new(ClarificationConfig::default());
        let a = store.get_or_create("a");
        let b = store.get_or_create("b");

        a.lock()
            .await
            .record_clarification("q", "which?", None)
            .unwrap();
        assert!(a.lock().await.is_awaiting());
        assert!(!b.lock().await.is_awaiting());

        assert!(Arc::ptr_eq(&a, &store.get_or_create("a")));
        assert_eq!(store.len(), 2);
        assert!(store.remove("a"));
        assert!(!store.remove("a"));
        assert!(!store.get_or_create("a").lock().await.is_awaiting());
    }
}
