//! SSE reader task.
//!
//! Opens the event stream, frames it with [`SseEventParser`], and dispatches
//! each decoded payload:
//!
//! | Payload                                  | Effect                                   |
//! |------------------------------------------|------------------------------------------|
//! | object with `session_id` / `sessionId`   | [`SessionRegistry::set_if_absent`]       |
//! | object with a recognizable `id`          | [`ResponseCorrelationMap::deliver`]      |
//! | `endpoint` event with a session query    | [`SessionRegistry::set_if_absent`]       |
//! | anything else that fails to decode       | logged at `WARN` and discarded           |
//!
//! The task never blocks senders; it only touches the shared structures for
//! the duration of an in-memory update.

use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::correlation::{Delivery, ResponseCorrelationMap};
use crate::http::PROTOCOL_VERSION_HEADER;
use crate::models::jsonrpc::{RequestId, Response};
use crate::session::SessionRegistry;
use crate::sse::parser::{SseEvent, SseEventParser};
use crate::{AppError, Result};

/// Payload keys that carry the session id, in lookup order.
pub const SESSION_KEYS: &[&str] = &["session_id", "sessionId"];

/// Background reader: consumes the SSE stream at `url` until it ends, fails,
/// or `cancel` fires.
///
/// # Errors
///
/// - [`AppError::Connection`]: the GET failed, returned a non-success
///   status, or the stream broke mid-read.
pub async fn run_event_reader(
    client: reqwest::Client,
    url: String,
    protocol_version: String,
    session: SessionRegistry,
    responses: ResponseCorrelationMap,
    cancel: CancellationToken,
) -> Result<()> {
    let request = client
        .get(&url)
        .header(ACCEPT, "text/event-stream")
        .header(PROTOCOL_VERSION_HEADER, &protocol_version)
        .send();

    let response = tokio::select! {
        biased;

        () = cancel.cancelled() => {
            debug!(url, "sse reader: cancelled before stream opened");
            return Ok(());
        }

        result = request => result
            .map_err(|e| AppError::Connection(format!("failed to open SSE stream {url}: {e}")))?,
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Connection(format!(
            "SSE endpoint {url} returned {status}: {body}"
        )));
    }

    info!(url, "sse reader: stream opened");

    let mut stream = response.bytes_stream();
    let mut parser = SseEventParser::new();

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(url, "sse reader: cancellation received, stopping");
                break;
            }

            chunk = stream.next() => {
                match chunk {
                    Some(Ok(bytes)) => {
                        for event in parser.feed(&bytes) {
                            dispatch_event(&event, &session, &responses);
                        }
                    }
                    Some(Err(e)) => {
                        warn!(url, error = %e, "sse reader: stream error, stopping");
                        return Err(AppError::Connection(format!("SSE stream error: {e}")));
                    }
                    None => {
                        if let Some(event) = parser.finish() {
                            dispatch_event(&event, &session, &responses);
                        }
                        info!(url, "sse reader: stream closed");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Apply one finalized event to the shared session and response state.
pub fn dispatch_event(
    event: &SseEvent,
    session: &SessionRegistry,
    responses: &ResponseCorrelationMap,
) {
    let Some(data) = event.data.as_deref() else {
        return;
    };
    let name = event.event.as_deref().unwrap_or("message");

    let payload: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(e) => {
            if name == "endpoint" {
                if let Some(session_id) = session_from_endpoint(data) {
                    establish_session(session, session_id);
                }
            }
            warn!(event = name, raw = data, error = %e, "sse reader: non-JSON event payload");
            return;
        }
    };

    if let Some(session_id) = session_from_payload(&payload) {
        establish_session(session, session_id);
    }

    let Some(raw_id) = payload.get("id") else {
        debug!(event = name, "sse reader: event without id");
        return;
    };

    let Some(id) = RequestId::from_value(raw_id) else {
        warn!(event = name, id = %raw_id, "sse reader: unrecognizable id, not correlated");
        return;
    };

    info!(%id, response = %payload, "sse reader: response received");
    match responses.deliver(id.clone(), Response::from_value(payload)) {
        Delivery::Resolved => debug!(%id, "sse reader: waiter resolved"),
        Delivery::Stored => debug!(%id, "sse reader: no waiter, response stored"),
    }
}

fn establish_session(session: &SessionRegistry, session_id: String) {
    if session.set_if_absent(session_id.clone()) {
        info!(session_id, "sse reader: connected, session established");
    } else {
        debug!(session_id, "sse reader: session already set, ignoring");
    }
}

/// Session id from the first recognized key in a decoded payload.
fn session_from_payload(payload: &Value) -> Option<String> {
    SESSION_KEYS
        .iter()
        .find_map(|key| payload.get(*key))
        .and_then(|value| match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::String(_) | Value::Null => None,
            other => Some(other.to_string()),
        })
}

/// Session id from an `endpoint` event such as `/messages/?session_id=abc`.
fn session_from_endpoint(data: &str) -> Option<String> {
    let (_, query) = data.trim().split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| SESSION_KEYS.contains(k))
        .map(|(_, v)| v.to_owned())
        .filter(|v| !v.is_empty())
}
