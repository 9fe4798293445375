//! # Invoker Telemetry
//!
//! Installs the process-wide `tracing` subscriber for binaries and test
//! harnesses that embed the channel client. Library crates only emit events;
//! they never install a subscriber themselves.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use invoker_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `INVOKER_SERVICE_NAME` | `chain-invoker` | Service name attached to the startup event |
//! | `INVOKER_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `INVOKER_JSON_LOGS` | `false` (`true` in containers) | JSON formatted output |

mod config;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use tracing_setup::{init_test_logging, TelemetryGuard};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Failed to install tracing subscriber: {0}")]
    SubscriberInit(String),
}

/// Install the tracing subscriber described by `config`.
///
/// Fails if a global subscriber is already installed.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    tracing_setup::init_tracing(&config)
}
