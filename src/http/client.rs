//! Session-oriented HTTP/SSE client.
//!
//! [`SseSession::connect`] spawns the SSE reader as a supervised task bound
//! to a [`CancellationToken`]; [`SseSession::shutdown`] (or dropping the
//! session) cancels it deterministically instead of waiting for the server
//! to close the stream.

use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::HttpConfig;
use crate::correlation::ResponseCorrelationMap;
use crate::http::sender::HttpRequestSender;
use crate::models::jsonrpc::{Request, RequestId, Response};
use crate::session::SessionRegistry;
use crate::sse::reader::run_event_reader;
use crate::{AppError, Result};

/// One SSE stream plus the sender that correlates against it.
pub struct SseSession {
    sender: HttpRequestSender,
    session: SessionRegistry,
    responses: ResponseCorrelationMap,
    cancel: CancellationToken,
    reader: Option<JoinHandle<Result<()>>>,
}

impl SseSession {
    /// Open the SSE stream and wait up to the connect grace period for the
    /// session id.
    ///
    /// # Errors
    ///
    /// - [`AppError::Connection`]: the HTTP client could not be built, or
    ///   the reader ended during the grace period (e.g. connection refused
    ///   or a non-success status).
    pub async fn connect(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::Connection(format!("failed to build HTTP client: {e}")))?;

        let session = SessionRegistry::new();
        let responses = ResponseCorrelationMap::new();
        let cancel = CancellationToken::new();

        info!(url = %config.sse_url(), "http: connecting to SSE endpoint");
        let mut reader = tokio::spawn(run_event_reader(
            client.clone(),
            config.sse_url(),
            config.protocol_version.clone(),
            session.clone(),
            responses.clone(),
            cancel.clone(),
        ));

        let early_exit = tokio::select! {
            _ = session.wait_for_session(config.connect_grace()) => None,
            joined = &mut reader => Some(joined),
        };
        let early_exit = match early_exit {
            Some(joined) => Some(joined),
            None if reader.is_finished() => Some((&mut reader).await),
            None => None,
        };

        if let Some(joined) = early_exit {
            return Err(match joined {
                Ok(Err(err)) => err,
                Ok(Ok(())) => AppError::Connection("SSE stream closed during connect".into()),
                Err(join) => AppError::Connection(format!("SSE reader task failed: {join}")),
            });
        }

        let sender = HttpRequestSender::new(client, config, session.clone(), responses.clone());

        Ok(Self {
            sender,
            session,
            responses,
            cancel,
            reader: Some(reader),
        })
    }

    /// Send a JSON-RPC request over this session.
    ///
    /// # Errors
    ///
    /// See [`HttpRequestSender::send_request`].
    pub async fn send(
        &self,
        method: &str,
        params: Option<Value>,
        id: impl Into<RequestId>,
    ) -> Result<Response> {
        self.sender.send(method, params, id).await
    }

    /// Send a prepared request over this session.
    ///
    /// # Errors
    ///
    /// See [`HttpRequestSender::send_request`].
    pub async fn send_request(&self, request: &Request) -> Result<Response> {
        self.sender.send_request(request).await
    }

    /// Session id established over SSE, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.session.get()
    }

    /// Correlation map fed by this session's reader.
    #[must_use]
    pub fn responses(&self) -> &ResponseCorrelationMap {
        &self.responses
    }

    /// `true` while the background reader is still consuming the stream.
    #[must_use]
    pub fn is_reader_running(&self) -> bool {
        self.reader.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel the reader and wait for it to stop.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Connection`] if the reader task panicked.
    pub async fn shutdown(mut self) -> Result<()> {
        self.cancel.cancel();
        let Some(reader) = self.reader.take() else {
            return Ok(());
        };

        match reader.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(%err, "http: SSE reader had stopped with an error"),
            Err(join) if join.is_cancelled() => {}
            Err(join) => {
                return Err(AppError::Connection(format!("SSE reader task failed: {join}")));
            }
        }

        info!("http: session closed");
        Ok(())
    }
}

impl Drop for SseSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
