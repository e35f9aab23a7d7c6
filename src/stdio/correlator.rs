//! Request/response correlation over a line-delimited pipe pair.
//!
//! One request is outstanding at a time: [`StdioCorrelator::send`] writes the
//! request as a single compact JSON line, flushes, then reads lines until a
//! protocol message appears or the attempt budget runs out. Every line read,
//! log output included, counts as one attempt.
//!
//! With [`IdMatching::FirstJson`] the first decodable JSON line is the answer
//! no matter which `id` it carries. [`IdMatching::Strict`] additionally skips
//! JSON lines whose `id` differs from the request's.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::FramedRead;
use tracing::{debug, warn};

use crate::config::IdMatching;
use crate::filter::{LineClass, LineClassifier};
use crate::models::jsonrpc::{Request, RequestId, Response};
use crate::stdio::codec::{StdioCodec, StdioFrame};
use crate::{AppError, Result};

/// Default number of lines read per request.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Sequential JSON-RPC client over a writer/reader pair.
pub struct StdioCorrelator<W, R> {
    writer: W,
    lines: FramedRead<R, StdioCodec>,
    classifier: Arc<dyn LineClassifier>,
    max_attempts: u32,
    read_timeout: Option<Duration>,
    id_matching: IdMatching,
}

impl<W, R> StdioCorrelator<W, R>
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    /// Create a correlator with [`DEFAULT_MAX_ATTEMPTS`], no read deadline,
    /// and [`IdMatching::FirstJson`].
    pub fn new(writer: W, reader: R, classifier: Arc<dyn LineClassifier>) -> Self {
        Self {
            writer,
            lines: FramedRead::new(reader, StdioCodec::new()),
            classifier,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            read_timeout: None,
            id_matching: IdMatching::FirstJson,
        }
    }

    /// Override the per-request attempt budget.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set a per-line read deadline; `None` waits indefinitely.
    #[must_use]
    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Select the response matching policy.
    #[must_use]
    pub fn with_id_matching(mut self, id_matching: IdMatching) -> Self {
        self.id_matching = id_matching;
        self
    }

    /// Send `request` and wait for its response.
    ///
    /// # Errors
    ///
    /// - [`AppError::Io`]: the write or flush failed.
    /// - [`AppError::ProtocolDecode`]: the first protocol-looking line did
    ///   not decode.
    /// - [`AppError::NoResponse`]: the attempt budget was exhausted, the
    ///   stream ended, or a per-line deadline elapsed.
    pub async fn send(&mut self, request: &Request) -> Result<Response> {
        self.write_request(request).await?;
        self.read_response(&request.id).await
    }

    async fn write_request(&mut self, request: &Request) -> Result<()> {
        let mut line = request.to_line()?;
        line.push('\n');

        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| AppError::Io(format!("write to server stdin failed: {e}")))?;
        self.writer
            .flush()
            .await
            .map_err(|e| AppError::Io(format!("flush of server stdin failed: {e}")))?;

        debug!(id = %request.id, method = %request.method, "stdio: request sent");
        Ok(())
    }

    async fn read_response(&mut self, expected: &RequestId) -> Result<Response> {
        for attempt in 1..=self.max_attempts {
            let line = match self.next_line().await? {
                None => {
                    return Err(AppError::NoResponse(format!(
                        "server stdout closed after {} line(s) while awaiting id {expected}",
                        attempt - 1
                    )));
                }
                Some(Err(e)) => return Err(e),
                Some(Ok(StdioFrame::Oversized)) => {
                    warn!(attempt, "stdio: line exceeds maximum length, skipping");
                    continue;
                }
                Some(Ok(StdioFrame::Line(line))) => line,
            };

            match self.classifier.classify(&line) {
                LineClass::Skip => {}
                LineClass::Log(text) => debug!(attempt, line = %text, "stdio: server log line"),
                LineClass::Unparseable(text) => {
                    warn!(attempt, line = %text, "stdio: non-JSON output");
                }
                LineClass::Malformed { raw, error } => {
                    return Err(AppError::ProtocolDecode(format!(
                        "failed to parse response: {error}; raw: {raw}"
                    )));
                }
                LineClass::Json(value) => {
                    let response = Response::from_value(value);
                    if self.id_matching == IdMatching::Strict
                        && response.id().as_ref() != Some(expected)
                    {
                        debug!(
                            attempt,
                            expected = %expected,
                            response = %response,
                            "stdio: skipping JSON line for another id"
                        );
                        continue;
                    }
                    debug!(attempt, id = %expected, "stdio: response received");
                    return Ok(response);
                }
            }
        }

        Err(AppError::NoResponse(format!(
            "no JSON-RPC line within {} attempt(s) for id {expected}",
            self.max_attempts
        )))
    }

    async fn next_line(&mut self) -> Result<Option<Result<StdioFrame>>> {
        match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, self.lines.next())
                .await
                .map_err(|_| {
                    AppError::NoResponse(format!("no output line within {limit:?}"))
                }),
            None => Ok(self.lines.next().await),
        }
    }
}
