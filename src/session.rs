//! Session identifier established by the first qualifying SSE event.
//!
//! Backed by a [`watch`] channel so waiters are woken as soon as the id is
//! published instead of polling. The first writer wins; later values are
//! ignored for the lifetime of the registry.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Shared, write-once session id holder.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Publish `session_id` unless one is already set.
    ///
    /// Returns `true` if this call established the session.
    pub fn set_if_absent(&self, session_id: impl Into<String>) -> bool {
        let session_id = session_id.into();
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(session_id);
            true
        })
    }

    /// Current session id, if established.
    #[must_use]
    pub fn get(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    /// Wait up to `max_wait` for the session id.
    ///
    /// Returns `None` when the ceiling elapses; callers proceed without a
    /// session header.
    pub async fn wait_for_session(&self, max_wait: Duration) -> Option<String> {
        let mut rx = self.tx.subscribe();
        let published = tokio::time::timeout(max_wait, async {
            rx.wait_for(Option::is_some)
                .await
                .ok()
                .and_then(|current| current.clone())
        })
        .await;
        published.ok().flatten().or_else(|| self.get())
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
