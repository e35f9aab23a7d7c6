//! Line codec for server stdout.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] with a maximum line length so a
//! server that never terminates a line cannot make the harness buffer
//! without bound. Trailing `\r` is stripped along with `\n`.
//!
//! An over-long line is reported as [`StdioFrame::Oversized`], never as a
//! decoder error: `FramedRead` yields a spurious `None` after any decoder
//! error, which a reader would take for end-of-stream.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};

use crate::{AppError, Result};

/// Maximum accepted line length: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// One decoded unit of server output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StdioFrame {
    /// A complete line without its terminator.
    Line(String),
    /// A line longer than the limit; its bytes are discarded up to the next
    /// newline.
    Oversized,
}

/// Newline-delimited UTF-8 decoder used with [`tokio_util::codec::FramedRead`].
#[derive(Debug)]
pub struct StdioCodec(LinesCodec);

impl StdioCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_BYTES)
    }

    /// Create a codec with a custom line limit.
    #[must_use]
    pub fn with_max_length(max: usize) -> Self {
        Self(LinesCodec::new_with_max_length(max))
    }
}

impl Default for StdioCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for StdioCodec {
    type Item = StdioFrame;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        into_frame(self.0.decode(src))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        into_frame(self.0.decode_eof(src))
    }
}

fn into_frame(
    decoded: std::result::Result<Option<String>, LinesCodecError>,
) -> Result<Option<StdioFrame>> {
    match decoded {
        Ok(line) => Ok(line.map(StdioFrame::Line)),
        Err(LinesCodecError::MaxLineLengthExceeded) => Ok(Some(StdioFrame::Oversized)),
        Err(LinesCodecError::Io(err)) => Err(AppError::Io(err.to_string())),
    }
}
