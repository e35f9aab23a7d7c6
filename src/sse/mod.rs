//! Server-Sent-Events side of the HTTP transport.
//!
//! - `parser`: incremental byte-level SSE event framing.
//! - `reader`: long-lived background task feeding the session registry and
//!   the response correlation map.

pub mod parser;
pub mod reader;

pub use parser::{SseEvent, SseEventParser};
pub use reader::{dispatch_event, run_event_reader};
