#![forbid(unsafe_code)]

//! Conformance harness for MCP servers over stdio and HTTP/SSE.

pub mod config;
pub mod correlation;
pub mod errors;
pub mod filter;
pub mod harness;
pub mod http;
pub mod models;
pub mod session;
pub mod sse;
pub mod stdio;

pub use config::HarnessConfig;
pub use errors::{AppError, Result};
