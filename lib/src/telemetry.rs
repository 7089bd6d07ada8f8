//! Global `tracing` subscriber setup for the binaries.

use crate::error::{PipelineError, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Installs a subscriber that logs at `level`, which may be a bare level or a
/// full filter directive such as `warn,atow=debug`. `RUST_LOG` takes
/// precedence when set. With `json`, one JSON
/// object per event is written instead of human-readable lines.
///
/// # Errors
/// `Config` if `level` is not a valid filter directive or a global subscriber
/// is already installed.
pub fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| PipelineError::Config(format!("invalid log level '{}': {}", level, e)))?,
    };
    let registry = Registry::default().with(filter);

    let installed = if json {
        registry
            .with(fmt::layer().json().with_current_span(false).with_target(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_thread_ids(true))
            .try_init()
    };
    installed.map_err(|e| PipelineError::Config(format!("cannot install log subscriber: {}", e)))
}
