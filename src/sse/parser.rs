//! # SSE Parser
//!
//! Incremental Server-Sent-Events parser. Bytes arrive in arbitrary chunks;
//! the parser buffers partial lines, accepts `\n`, `\r` and `\r\n` line
//! endings (including a `\r\n` pair split across chunks), and yields one
//! [`SseEvent`] per blank line.
//!
//! Field handling:
//! - `event:` sets the pending event name.
//! - `data:` sets the pending payload (a later `data:` line in the same event
//!   replaces it).
//! - `id:` is recorded on the event.
//! - `:`-prefixed comment lines and unknown fields are ignored.

use bytes::BytesMut;

/// One finalized SSE event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name from the last `event:` line.
    pub event: Option<String>,
    /// Payload from the last `data:` line.
    pub data: Option<String>,
    /// Event id from the last `id:` line.
    pub id: Option<String>,
}

impl SseEvent {
    fn is_empty(&self) -> bool {
        self.event.is_none() && self.data.is_none() && self.id.is_none()
    }
}

/// Stateful SSE framing over a chunked byte stream.
#[derive(Debug, Default)]
pub struct SseEventParser {
    line: BytesMut,
    pending: SseEvent,
    /// Previous chunk ended on `\r`; a leading `\n` belongs to that ending.
    skip_lf: bool,
}

impl SseEventParser {
    /// Create an empty parser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume `chunk`, returning every event it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();
        let mut rest = chunk;

        if self.skip_lf && !rest.is_empty() {
            if rest[0] == b'\n' {
                rest = &rest[1..];
            }
            self.skip_lf = false;
        }

        while let Some(pos) = rest.iter().position(|&b| b == b'\n' || b == b'\r') {
            self.line.extend_from_slice(&rest[..pos]);
            let delimiter = rest[pos];
            rest = &rest[pos + 1..];

            if let Some(event) = self.end_line() {
                events.push(event);
            }

            if delimiter == b'\r' {
                match rest.first() {
                    Some(b'\n') => rest = &rest[1..],
                    Some(_) => {}
                    None => self.skip_lf = true,
                }
            }
        }

        self.line.extend_from_slice(rest);
        events
    }

    /// Flush state at end of stream.
    ///
    /// An unterminated final line is processed, and a pending event that
    /// never saw its blank line is still returned.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.line.is_empty() {
            let line = self.line.split();
            self.apply_field(&String::from_utf8_lossy(&line));
        }
        self.skip_lf = false;
        self.dispatch()
    }

    fn end_line(&mut self) -> Option<SseEvent> {
        let line = self.line.split();
        if line.is_empty() {
            return self.dispatch();
        }
        self.apply_field(&String::from_utf8_lossy(&line));
        None
    }

    fn apply_field(&mut self, line: &str) {
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.pending.event = Some(value.trim().to_owned()),
            "data" => self.pending.data = Some(value.to_owned()),
            "id" => self.pending.id = Some(value.to_owned()),
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.pending.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.pending))
    }
}
