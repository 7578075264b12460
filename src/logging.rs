//! Logging initialization for the unitres CLI
//!
//! The log level is controlled via the RUST_LOG environment variable:
//! - RUST_LOG=debug unitres resolve ...  (verbose logging)
//! - RUST_LOG=info unitres resolve ...   (default level)
//! - RUST_LOG=error unitres resolve ...  (errors only)

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing output to stderr, leaving stdout to the resolved
/// manifest itself.
pub fn init() -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("unitres=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}
