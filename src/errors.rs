//! Error types shared across the harness.

use std::fmt::{Display, Formatter};

/// Shared harness result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Harness error enumeration covering every transport failure mode.
///
/// Each error is terminal only for the request or phase that produced it;
/// the scenario runner records it and moves on to the next scenario.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// File-system or process I/O failure outside the protocol exchange.
    Io(String),
    /// The server process was absent or exited before first use.
    TransportStartup(String),
    /// The stdio attempt budget was exhausted without a decodable line.
    NoResponse(String),
    /// A line or body looked like JSON but failed to parse.
    ProtocolDecode(String),
    /// Network-level failure opening the SSE stream or sending a POST.
    Connection(String),
    /// The server answered a POST with an unexpected status code.
    HttpStatus {
        /// HTTP status code returned by the server.
        status: u16,
        /// Raw response body text.
        body: String,
    },
    /// An asynchronously delivered response never arrived within the ceiling.
    ResponseTimeout(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::TransportStartup(msg) => write!(f, "transport startup: {msg}"),
            Self::NoResponse(msg) => write!(f, "no response: {msg}"),
            Self::ProtocolDecode(msg) => write!(f, "protocol decode: {msg}"),
            Self::Connection(msg) => write!(f, "connection: {msg}"),
            Self::HttpStatus { status, body } => write!(f, "http status {status}: {body}"),
            Self::ResponseTimeout(msg) => write!(f, "response timeout: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Connection(err.to_string())
    }
}
