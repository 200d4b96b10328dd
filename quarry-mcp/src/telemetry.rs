//! Tracing subscriber setup for the server binary.

use crate::McpError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter applied when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "quarry=info,warn";

/// Install a JSON subscriber writing to stderr.
///
/// Stdout carries the protocol, so nothing else may write there.
pub fn init_tracing() -> Result<(), McpError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .try_init()
        .map_err(|e| McpError::Telemetry(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_version = env!("CARGO_PKG_VERSION"),
        "Telemetry initialized"
    );
    Ok(())
}
