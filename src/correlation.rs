//! Request-id to response correlation for asynchronously delivered replies.
//!
//! A sender registers its request id *before* posting and receives a
//! [`PendingResponse`]; the SSE reader calls
//! [`ResponseCorrelationMap::deliver`] when an event carrying that id is
//! decoded. Each registration is resolved at most once.
//!
//! Responses that arrive with no registered waiter are stored and can be
//! claimed later with [`ResponseCorrelationMap::take`] or by a subsequent
//! [`ResponseCorrelationMap::register`]. A second delivery for the same
//! unclaimed id replaces the first. Stored entries are never expired.
//!
//! Registering an id that already has a live waiter replaces that waiter;
//! the displaced [`PendingResponse`] fails when awaited.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;

use crate::models::jsonrpc::{RequestId, Response};
use crate::{AppError, Result};

enum Slot {
    Waiting(oneshot::Sender<Response>),
    Ready(Response),
}

/// What [`ResponseCorrelationMap::deliver`] did with a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A registered waiter received the response.
    Resolved,
    /// No live waiter; the response was stored for later retrieval.
    Stored,
}

/// Thread-safe id → response map shared by the SSE reader and senders.
///
/// The lock is only held for in-memory map operations, never across I/O.
#[derive(Clone, Default)]
pub struct ResponseCorrelationMap {
    slots: Arc<Mutex<HashMap<RequestId, Slot>>>,
}

impl ResponseCorrelationMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in `id`.
    ///
    /// If a response for `id` is already stored it is handed to the returned
    /// [`PendingResponse`] immediately.
    #[must_use]
    pub fn register(&self, id: RequestId) -> PendingResponse {
        let (tx, rx) = oneshot::channel();
        {
            let mut slots = self.lock();
            if let Some(Slot::Ready(response)) = slots.remove(&id) {
                debug!(%id, "correlation: response already stored at registration");
                // The receiver is alive (held below), so this cannot fail.
                let _ = tx.send(response);
            } else {
                slots.insert(id.clone(), Slot::Waiting(tx));
            }
        }

        PendingResponse {
            id,
            rx,
            map: self.clone(),
        }
    }

    /// Route a decoded response to its waiter, or store it.
    pub fn deliver(&self, id: RequestId, response: Response) -> Delivery {
        let mut slots = self.lock();
        let response = match slots.remove(&id) {
            Some(Slot::Waiting(tx)) => match tx.send(response) {
                Ok(()) => return Delivery::Resolved,
                Err(response) => response,
            },
            Some(Slot::Ready(_)) | None => response,
        };
        slots.insert(id, Slot::Ready(response));
        Delivery::Stored
    }

    /// Drop a live registration for `id`. Stored responses are left intact.
    pub fn cancel(&self, id: &RequestId) {
        let mut slots = self.lock();
        if matches!(slots.get(id), Some(Slot::Waiting(_))) {
            slots.remove(id);
        }
    }

    /// Remove and return a stored response for `id`.
    #[must_use]
    pub fn take(&self, id: &RequestId) -> Option<Response> {
        let mut slots = self.lock();
        match slots.get(id) {
            Some(Slot::Ready(_)) => match slots.remove(id) {
                Some(Slot::Ready(response)) => Some(response),
                _ => None,
            },
            _ => None,
        }
    }

    /// `true` if a response for `id` is stored and unclaimed.
    #[must_use]
    pub fn contains(&self, id: &RequestId) -> bool {
        matches!(self.lock().get(id), Some(Slot::Ready(_)))
    }

    /// `true` if a sender is currently waiting on `id`.
    #[must_use]
    pub fn is_waiting(&self, id: &RequestId) -> bool {
        matches!(self.lock().get(id), Some(Slot::Waiting(_)))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A registered, not yet resolved response.
pub struct PendingResponse {
    id: RequestId,
    rx: oneshot::Receiver<Response>,
    map: ResponseCorrelationMap,
}

impl PendingResponse {
    /// The id this registration waits on.
    #[must_use]
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Wait up to `timeout` for the response.
    ///
    /// On timeout the registration is removed, so a late delivery is stored
    /// rather than lost.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ResponseTimeout`] when the ceiling elapses or the
    /// registration was displaced by a newer one for the same id.
    pub async fn wait(self, timeout: Duration) -> Result<Response> {
        let Self { id, rx, map } = self;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_closed)) => Err(AppError::ResponseTimeout(format!(
                "registration for id {id} was replaced before a response arrived"
            ))),
            Err(_elapsed) => {
                map.cancel(&id);
                Err(AppError::ResponseTimeout(format!(
                    "no response for id {id} within {timeout:?}"
                )))
            }
        }
    }

    /// Abandon the registration without waiting.
    pub fn cancel(self) {
        self.map.cancel(&self.id);
    }
}
