//! Console tracing for the gophertalk binary
//!
//! Usage:
//!   gophertalk --debug serve                   # Debug logging, with targets
//!   RUST_LOG=gophertalk_server=debug gophertalk serve

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Debug level unless RUST_LOG is set
    pub debug: bool,
}

pub fn init(config: &TracingConfig) -> Result<()> {
    let fallback = if config.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.debug)
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}
