//! JSON-RPC 2.0 request and response envelopes.
//!
//! Responses are kept as the raw decoded [`Value`] so that whatever the
//! server sent is reported verbatim; accessors pull out the members the
//! harness inspects.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{AppError, Result};

/// Protocol version string carried in every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Correlation identifier exactly as transmitted on the wire.
///
/// Numbers and strings are distinct: `1` never matches `"1"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Integer identifier.
    Number(i64),
    /// String identifier.
    Text(String),
}

impl RequestId {
    /// Extract a recognizable identifier from a decoded `id` member.
    ///
    /// Returns `None` for `null`, fractional numbers, and structured values.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Number),
            Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

/// Outbound JSON-RPC request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Caller-assigned correlation id.
    pub id: RequestId,
    /// Method name (e.g. `tools/list`).
    pub method: String,
    /// Optional structured parameters; omitted from the envelope when `None`.
    pub params: Option<Value>,
}

impl Request {
    /// Build a request.
    #[must_use]
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    /// Render the full `{jsonrpc, id, method, params?}` envelope.
    #[must_use]
    pub fn envelope(&self) -> Value {
        let mut envelope = json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": self.id,
            "method": self.method,
        });
        if let (Some(params), Some(obj)) = (&self.params, envelope.as_object_mut()) {
            obj.insert("params".into(), params.clone());
        }
        envelope
    }

    /// Serialise the envelope to one compact, newline-free JSON line.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ProtocolDecode`] if serialisation fails.
    pub fn to_line(&self) -> Result<String> {
        serde_json::to_string(&self.envelope())
            .map_err(|e| AppError::ProtocolDecode(format!("failed to serialise request: {e}")))
    }
}

/// Inbound JSON-RPC response (or any decoded JSON object taken as one).
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    raw: Value,
}

impl Response {
    /// Wrap a decoded value.
    #[must_use]
    pub fn from_value(raw: Value) -> Self {
        Self { raw }
    }

    /// Correlation id, if present and recognizable.
    #[must_use]
    pub fn id(&self) -> Option<RequestId> {
        self.raw.get("id").and_then(RequestId::from_value)
    }

    /// The `result` member, if present.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        self.raw.get("result")
    }

    /// The `error` member, if present.
    #[must_use]
    pub fn error(&self) -> Option<&Value> {
        self.raw.get("error")
    }

    /// `true` when the response carries a `result` and no `error`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result().is_some() && self.error().is_none()
    }

    /// Borrow the raw decoded value.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.raw
    }

    /// Consume the response, returning the raw decoded value.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.raw
    }
}

impl Display for Response {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}
