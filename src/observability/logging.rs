//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the process-wide `tracing` subscriber
//! - Pick text or JSON output from config
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured filter
//! - Access lines are ordinary events on the `xend::access` target, so they
//!   can be filtered independently (`RUST_LOG=xend=warn,xend::access=info`)

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter, Layer,
};

use crate::config::{LogConfig, LogFormat};

/// Build the filter: `RUST_LOG` if set and valid, the configured directive otherwise.
pub fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter))
}

/// Install the global subscriber.
pub fn init_logging(config: &LogConfig) -> Result<(), TryInitError> {
    let output = match config.format {
        LogFormat::Text => fmt::layer().boxed(),
        LogFormat::Json => fmt::layer().json().boxed(),
    };

    tracing_subscriber::registry()
        .with(output)
        .with(env_filter(config))
        .try_init()
}
