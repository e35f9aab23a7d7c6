//! Line-delimited JSON-RPC over a spawned server's stdio.
//!
//! - `codec`: bounded line framing for the server's stdout.
//! - `correlator`: one-request-at-a-time send/await loop over any pipe pair.
//! - `spawner`: process launch, liveness checks, stderr capture, teardown.

pub mod codec;
pub mod correlator;
pub mod spawner;

pub use correlator::StdioCorrelator;
pub use spawner::{spawn_server, StdioTransport};
