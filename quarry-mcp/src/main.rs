//! Quarry MCP server entry point
//!
//! Loads configuration, builds the orchestrator and serves MCP over stdio.

use quarry_core::QuarryConfig;
use quarry_mcp::{telemetry, McpError, McpServer};
use quarry_orchestrator::Orchestrator;
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> Result<(), McpError> {
    telemetry::init_tracing()?;

    let config = QuarryConfig::load()?;
    let orchestrator = Orchestrator::new(&config)?;
    tracing::info!(
        base_url = %config.base_url(),
        max_calls_per_minute = config.max_calls_per_minute,
        "Starting Quarry MCP server"
    );

    let server = McpServer::new(orchestrator);
    tokio::select! {
        result = server.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout()) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
