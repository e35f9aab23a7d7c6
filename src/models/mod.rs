//! Wire-level data model shared by both transports.

pub mod jsonrpc;
