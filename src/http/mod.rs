//! HTTP side of the HTTP/SSE transport.
//!
//! - `sender`: POSTs JSON-RPC envelopes and resolves the reply, either from
//!   the synchronous body (`200`) or from the SSE stream (`202`).
//! - `client`: session-oriented client composing the background SSE reader
//!   with a sender.

pub mod client;
pub mod sender;

pub use client::SseSession;
pub use sender::HttpRequestSender;

/// Header carrying the negotiated protocol version.
pub const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

/// Header carrying the session id established over SSE.
pub const SESSION_ID_HEADER: &str = "mcp-session-id";
