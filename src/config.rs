//! Harness configuration parsing and validation.
//!
//! Every field has a default, so an empty TOML document (or no file at all)
//! yields a usable configuration. CLI flags override individual values after
//! loading.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// How the stdio transport decides which JSON line answers a request.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdMatching {
    /// The first decodable JSON line is the answer, whatever its `id`.
    #[default]
    FirstJson,
    /// Only a JSON line whose `id` equals the request's `id` is the answer.
    Strict,
}

/// Settings for the spawned stdio server.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct StdioConfig {
    /// Server binary to launch.
    #[serde(default)]
    pub command: Option<String>,
    /// Arguments passed to the server binary.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables for the child process.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Delay between launch and the second liveness check.
    #[serde(default = "default_startup_grace_ms")]
    pub startup_grace_ms: u64,
    /// Lines read per request before giving up.
    #[serde(default = "default_max_read_attempts")]
    pub max_read_attempts: u32,
    /// Optional per-line read deadline; absent means wait indefinitely.
    #[serde(default)]
    pub read_timeout_ms: Option<u64>,
    /// Response selection policy.
    #[serde(default)]
    pub id_matching: IdMatching,
    /// `protocolVersion` sent in the stdio `initialize` request.
    #[serde(default = "default_stdio_protocol_version")]
    pub protocol_version: String,
}

impl StdioConfig {
    /// Startup grace period as a [`Duration`].
    #[must_use]
    pub fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms)
    }

    /// Per-line read deadline as a [`Duration`], if configured.
    #[must_use]
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for StdioConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            env: HashMap::new(),
            startup_grace_ms: default_startup_grace_ms(),
            max_read_attempts: default_max_read_attempts(),
            read_timeout_ms: None,
            id_matching: IdMatching::default(),
            protocol_version: default_stdio_protocol_version(),
        }
    }
}

/// Settings for the HTTP/SSE session client.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct HttpConfig {
    /// Server base URL, e.g. `http://localhost:8081`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path of the SSE endpoint.
    #[serde(default = "default_sse_path")]
    pub sse_path: String,
    /// Path that accepts JSON-RPC POSTs.
    #[serde(default = "default_post_path")]
    pub post_path: String,
    /// Value of the `mcp-protocol-version` header.
    #[serde(default = "default_http_protocol_version")]
    pub protocol_version: String,
    /// Ceiling for waiting on the session id before a POST.
    #[serde(default = "default_ten")]
    pub session_wait_seconds: u64,
    /// Ceiling for an asynchronously delivered (202) response.
    #[serde(default = "default_ten")]
    pub response_timeout_seconds: u64,
    /// Delay after opening the SSE stream before the first request.
    #[serde(default = "default_connect_grace_ms")]
    pub connect_grace_ms: u64,
    /// Timeout applied to each POST round-trip.
    #[serde(default = "default_ten")]
    pub request_timeout_seconds: u64,
    /// Pause between consecutive scenarios.
    #[serde(default = "default_pause_between_ms")]
    pub pause_between_ms: u64,
}

impl HttpConfig {
    /// Absolute URL of the SSE endpoint.
    #[must_use]
    pub fn sse_url(&self) -> String {
        join_url(&self.base_url, &self.sse_path)
    }

    /// Absolute URL that accepts JSON-RPC POSTs.
    #[must_use]
    pub fn post_url(&self) -> String {
        join_url(&self.base_url, &self.post_path)
    }

    /// Session wait ceiling as a [`Duration`].
    #[must_use]
    pub fn session_wait(&self) -> Duration {
        Duration::from_secs(self.session_wait_seconds)
    }

    /// Async response ceiling as a [`Duration`].
    #[must_use]
    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_seconds)
    }

    /// Connect grace period as a [`Duration`].
    #[must_use]
    pub fn connect_grace(&self) -> Duration {
        Duration::from_millis(self.connect_grace_ms)
    }

    /// POST timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Inter-scenario pause as a [`Duration`].
    #[must_use]
    pub fn pause_between(&self) -> Duration {
        Duration::from_millis(self.pause_between_ms)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            sse_path: default_sse_path(),
            post_path: default_post_path(),
            protocol_version: default_http_protocol_version(),
            session_wait_seconds: default_ten(),
            response_timeout_seconds: default_ten(),
            connect_grace_ms: default_connect_grace_ms(),
            request_timeout_seconds: default_ten(),
            pause_between_ms: default_pause_between_ms(),
        }
    }
}

/// Log-line recognition settings.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LogConfig {
    /// Extra substrings that mark a stdio line as log output.
    #[serde(default)]
    pub markers: Vec<String>,
}

/// Harness configuration parsed from an optional `probe.toml`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct HarnessConfig {
    /// Stdio transport settings.
    #[serde(default)]
    pub stdio: StdioConfig,
    /// HTTP/SSE transport settings.
    #[serde(default)]
    pub http: HttpConfig,
    /// Log classification settings.
    #[serde(default)]
    pub log: LogConfig,
}

fn default_startup_grace_ms() -> u64 {
    2000
}

fn default_max_read_attempts() -> u32 {
    10
}

fn default_stdio_protocol_version() -> String {
    "2024-11-05".into()
}

fn default_base_url() -> String {
    "http://localhost:8081".into()
}

fn default_sse_path() -> String {
    "/sse".into()
}

fn default_post_path() -> String {
    "/".into()
}

fn default_http_protocol_version() -> String {
    "2025-06-18".into()
}

fn default_ten() -> u64 {
    10
}

fn default_connect_grace_ms() -> u64 {
    2000
}

fn default_pause_between_ms() -> u64 {
    1000
}

impl HarnessConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges after loading or after CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.stdio.max_read_attempts == 0 {
            return Err(AppError::Config(
                "stdio.max_read_attempts must be greater than zero".into(),
            ));
        }

        let ceilings = [
            ("http.session_wait_seconds", self.http.session_wait_seconds),
            ("http.response_timeout_seconds", self.http.response_timeout_seconds),
            ("http.request_timeout_seconds", self.http.request_timeout_seconds),
            ("http.connect_grace_ms", self.http.connect_grace_ms),
        ];
        if let Some((name, _)) = ceilings.iter().find(|(_, value)| *value == 0) {
            return Err(AppError::Config(format!("{name} must be greater than zero")));
        }

        if !(self.http.base_url.starts_with("http://") || self.http.base_url.starts_with("https://"))
        {
            return Err(AppError::Config(format!(
                "http.base_url must be an http(s) URL, got {}",
                self.http.base_url
            )));
        }

        Ok(())
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
