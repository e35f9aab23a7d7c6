//! Stdio server process launcher.
//!
//! Spawns the server under test with all three stdio streams piped and
//! `kill_on_drop(true)`. The server's stderr is drained by a background task
//! into a shared buffer so a chatty server can never block on a full pipe,
//! and so the captured text can be attached to a startup failure.
//!
//! Liveness is checked immediately after launch, again after the startup
//! grace period, and once more right before the first request is sent.

use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::StdioConfig;
use crate::filter::LineClassifier;
use crate::models::jsonrpc::{Request, Response};
use crate::stdio::correlator::StdioCorrelator;
use crate::{AppError, Result};

/// Environment variable that switches the server into stdio mode.
pub const STDIO_MODE_ENV: &str = "MCP_STDIO_MODE";

/// How long teardown waits for a graceful exit before killing the server.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// How long a startup failure waits for the stderr drain to finish.
const STDERR_COLLECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Running stdio server with a correlator bound to its pipes.
pub struct StdioTransport {
    child: Child,
    correlator: StdioCorrelator<ChildStdin, ChildStdout>,
    stderr: StderrTap,
    verified: bool,
}

impl StdioTransport {
    /// OS process id of the server, if it is still running.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Send one request and wait for its response.
    ///
    /// The first call re-checks that the server is alive before writing.
    ///
    /// # Errors
    ///
    /// - [`AppError::TransportStartup`]: the server exited before first use.
    /// - Any error from [`StdioCorrelator::send`].
    pub async fn send(&mut self, request: &Request) -> Result<Response> {
        if !self.verified {
            ensure_running(&mut self.child, &self.stderr, "before first request").await?;
            self.verified = true;
        }
        self.correlator.send(request).await
    }

    /// Text the server has written to stderr so far.
    #[must_use]
    pub fn stderr_text(&self) -> String {
        self.stderr.snapshot()
    }

    /// Close the server's stdin, wait up to [`SHUTDOWN_GRACE`], then kill it.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if waiting on or killing the process fails.
    pub async fn shutdown(self) -> Result<()> {
        let Self {
            mut child,
            correlator,
            stderr,
            ..
        } = self;

        // Dropping the correlator closes stdin, which most stdio servers
        // treat as a request to exit.
        drop(correlator);

        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                info!(%status, "stdio server exited");
            }
            Ok(Err(err)) => {
                return Err(AppError::Io(format!("failed to wait for server: {err}")));
            }
            Err(_elapsed) => {
                warn!("stdio server did not exit within grace period, killing");
                child
                    .kill()
                    .await
                    .map_err(|err| AppError::Io(format!("failed to kill server: {err}")))?;
            }
        }

        stderr.handle.abort();
        Ok(())
    }
}

/// Launch the configured server and wait out its startup grace period.
///
/// # Errors
///
/// - `AppError::Config`: no `command` is configured.
/// - `AppError::TransportStartup`: spawn failed, a pipe could not be
///   captured, or the process exited during startup (with captured stderr).
pub async fn spawn_server(
    config: &StdioConfig,
    classifier: Arc<dyn LineClassifier>,
) -> Result<StdioTransport> {
    let program = config
        .command
        .as_deref()
        .ok_or_else(|| AppError::Config("stdio.command is not set".into()))?;

    let mut cmd = Command::new(program);
    cmd.args(&config.args)
        .envs(&config.env)
        .env(STDIO_MODE_ENV, "true")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|err| {
        AppError::TransportStartup(format!("failed to spawn {program}: {err}"))
    })?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| AppError::TransportStartup("failed to capture server stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::TransportStartup("failed to capture server stdout".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::TransportStartup("failed to capture server stderr".into()))?;

    let stderr = StderrTap::spawn(stderr);
    info!(program, pid = ?child.id(), "stdio server launched");

    ensure_running(&mut child, &stderr, "immediately after launch").await?;
    tokio::time::sleep(config.startup_grace()).await;
    ensure_running(&mut child, &stderr, "during startup").await?;

    let correlator = StdioCorrelator::new(stdin, stdout, classifier)
        .with_max_attempts(config.max_read_attempts)
        .with_read_timeout(config.read_timeout())
        .with_id_matching(config.id_matching);

    Ok(StdioTransport {
        child,
        correlator,
        stderr,
        verified: false,
    })
}

/// Fail with [`AppError::TransportStartup`] if the child has exited.
async fn ensure_running(child: &mut Child, stderr: &StderrTap, phase: &str) -> Result<()> {
    let status = child
        .try_wait()
        .map_err(|err| AppError::Io(format!("failed to poll server process: {err}")))?;

    match status {
        None => Ok(()),
        Some(status) => {
            let captured = stderr.collect().await;
            Err(AppError::TransportStartup(describe_exit(phase, status, &captured)))
        }
    }
}

fn describe_exit(phase: &str, status: ExitStatus, stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("server exited {phase} ({status})")
    } else {
        format!("server exited {phase} ({status}); stderr: {stderr}")
    }
}

/// Background drain of the server's stderr into a shared buffer.
struct StderrTap {
    buffer: Arc<Mutex<String>>,
    handle: JoinHandle<()>,
}

impl StderrTap {
    fn spawn(stderr: ChildStderr) -> Self {
        let buffer = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&buffer);

        let handle = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        debug!(line = %line, "stdio: server stderr");
                        let mut buf = sink.lock().unwrap_or_else(PoisonError::into_inner);
                        buf.push_str(&line);
                        buf.push('\n');
                    }
                    Ok(None) => break,
                    Err(err) => {
                        debug!(%err, "stdio: stderr read failed, stopping drain");
                        break;
                    }
                }
            }
        });

        Self { buffer, handle }
    }

    fn snapshot(&self) -> String {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Give the drain a moment to reach EOF, then return what it captured.
    async fn collect(&self) -> String {
        let deadline = tokio::time::Instant::now() + STDERR_COLLECT_TIMEOUT;
        while !self.handle.is_finished() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.snapshot()
    }
}
