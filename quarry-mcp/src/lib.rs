//! Quarry MCP - Tool Server
//!
//! Exposes the orchestrator's operations as MCP tools. The server speaks
//! newline-delimited JSON-RPC 2.0, normally over stdio.

pub mod dispatch;
pub mod server;
pub mod telemetry;
pub mod tools;
pub mod types;

pub use dispatch::{call_tool, dispatch, validate_tool_input, ToolError};
pub use server::McpServer;
pub use tools::catalog;

use quarry_core::QuarryError;
use thiserror::Error;

/// Errors that stop the server process.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Startup failed: {0}")]
    Startup(#[from] QuarryError),

    #[error("I/O error on the protocol stream: {0}")]
    Io(#[from] std::io::Error),

    #[error("Telemetry error: {0}")]
    Telemetry(String),
}
