// Logging module - Logging infrastructure
use crate::domain::error::{BridgeError, BridgeResult};
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directive used when `RUST_LOG` is not set
pub fn default_directive(log_level: &str, verbose: bool) -> String {
    let level = if verbose { "debug" } else { log_level };
    format!("tcp2serial={},warn", level)
}

/// Initialize logging system
pub fn init_logging(log_level: &str, verbose: bool) -> BridgeResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(log_level, verbose)))
        .map_err(|e| BridgeError::config(format!("Invalid log level '{}': {}", log_level, e)))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .try_init()
        .map_err(|e| BridgeError::Internal(format!("Failed to install logger: {}", e)))?;

    tracing::debug!("tcp2serial logging system initialized");
    Ok(())
}
