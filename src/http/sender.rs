//! JSON-RPC POST sender.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::HttpConfig;
use crate::correlation::ResponseCorrelationMap;
use crate::http::{PROTOCOL_VERSION_HEADER, SESSION_ID_HEADER};
use crate::models::jsonrpc::{Request, RequestId, Response};
use crate::session::SessionRegistry;
use crate::{AppError, Result};

/// Posts requests and resolves their responses.
///
/// Cloning is cheap; all clones share the HTTP client, the session registry,
/// and the correlation map.
#[derive(Clone)]
pub struct HttpRequestSender {
    client: reqwest::Client,
    post_url: String,
    protocol_version: String,
    session: SessionRegistry,
    responses: ResponseCorrelationMap,
    session_wait: Duration,
    response_timeout: Duration,
    request_timeout: Duration,
}

impl HttpRequestSender {
    /// Build a sender from `config` sharing `session` and `responses` with an
    /// SSE reader.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        config: &HttpConfig,
        session: SessionRegistry,
        responses: ResponseCorrelationMap,
    ) -> Self {
        Self {
            client,
            post_url: config.post_url(),
            protocol_version: config.protocol_version.clone(),
            session,
            responses,
            session_wait: config.session_wait(),
            response_timeout: config.response_timeout(),
            request_timeout: config.request_timeout(),
        }
    }

    /// Build and send `{jsonrpc, id, method, params?}`.
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
        self.send_request(&Request::new(id, method, params)).await
    }

    /// Send a prepared request and resolve its response.
    ///
    /// Waits up to the session ceiling for a session id first and proceeds
    /// without one if it never appears. The request id is registered with
    /// the correlation map before the POST so an SSE reply racing the HTTP
    /// status cannot be missed.
    ///
    /// # Errors
    ///
    /// - [`AppError::Connection`]: the POST could not be sent or its body
    ///   could not be read.
    /// - [`AppError::ResponseTimeout`]: `202` and no matching SSE event
    ///   arrived within the ceiling.
    /// - [`AppError::ProtocolDecode`]: `200` with a body that is not JSON.
    /// - [`AppError::HttpStatus`]: any other status.
    pub async fn send_request(&self, request: &Request) -> Result<Response> {
        let session_id = match self.session.get() {
            Some(id) => Some(id),
            None => self.session.wait_for_session(self.session_wait).await,
        };
        if session_id.is_none() {
            warn!(
                method = %request.method,
                "http: no session id available, sending without session header"
            );
        }

        let pending = self.responses.register(request.id.clone());

        let mut builder = self
            .client
            .post(&self.post_url)
            .timeout(self.request_timeout)
            .header(PROTOCOL_VERSION_HEADER, &self.protocol_version)
            .json(&request.envelope());
        if let Some(session_id) = &session_id {
            builder = builder.header(SESSION_ID_HEADER, session_id);
        }

        info!(id = %request.id, method = %request.method, "http: sending request");

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                pending.cancel();
                return Err(AppError::Connection(format!(
                    "POST {} failed: {e}",
                    self.post_url
                )));
            }
        };

        match response.status() {
            StatusCode::ACCEPTED => {
                info!(id = %request.id, "http: request accepted, awaiting SSE delivery");
                pending.wait(self.response_timeout).await
            }
            StatusCode::OK => {
                pending.cancel();
                let text = response
                    .text()
                    .await
                    .map_err(|e| AppError::Connection(format!("failed to read body: {e}")))?;
                serde_json::from_str::<Value>(&text)
                    .map(Response::from_value)
                    .map_err(|e| {
                        AppError::ProtocolDecode(format!("invalid JSON body ({e}): {text}"))
                    })
            }
            status => {
                pending.cancel();
                let body = response.text().await.unwrap_or_default();
                Err(AppError::HttpStatus {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}
