//! Model Context Protocol (MCP) surface for docrelay.
//!
//! The server exposes the same orchestrator pipeline that backs the ACP routes, over stdio,
//! so agent hosts can run document tasks and reach the model directly:
//!
//! - Tools: `process-document`, `summarize-text`, `answer-question`, `extract-key-points`,
//!   `analyze-text`, `generate`, and `metrics`.
//! - Resources: `mcp://capabilities` and `mcp://settings`.
//!
//! Handlers, schemas, and formatting helpers live in focused submodules.

mod format;
pub mod handlers;
mod registry;
mod schemas;
mod server;

pub use server::DocRelayMcpServer;

/// Caller identity recorded on requests that arrive over MCP.
pub(crate) const MCP_SOURCE: &str = "mcp";
