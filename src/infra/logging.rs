//! Usage: Process-wide `tracing` subscriber setup.

use crate::shared::error::{ClientError, ClientResult};
use tracing_subscriber::EnvFilter;

/// Installs a fmt subscriber; `RUST_LOG` wins over `fallback_filter`.
pub fn init(fallback_filter: &str) -> ClientResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(fallback_filter).map_err(|e| {
            ClientError::Config(format!("invalid log filter {fallback_filter:?}: {e}"))
        })?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| ClientError::Config(format!("tracing subscriber already installed: {e}")))
}
