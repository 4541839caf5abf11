//! # PushProx Telemetry
//!
//! Logging and metrics for the relay.
//!
//! ## Components
//!
//! - **Logs**: `tracing` with an `EnvFilter`, human-readable or JSON lines
//! - **Metrics**: a global Prometheus registry exposed on `/metrics`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pushprox_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PUSHPROX_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `PUSHPROX_LOG_FORMAT` | `logfmt` | `logfmt` or `json` |

#![allow(missing_docs)]

mod config;
mod logging;
pub mod metrics;

pub use config::{LogFormat, TelemetryConfig};
pub use logging::init_logging;
pub use metrics::{encode_metrics, register_metrics};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Register metrics and install the global log subscriber.
///
/// Returns a guard to hold for the lifetime of the process.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    register_metrics()?;
    init_logging(&config)?;

    Ok(TelemetryGuard { _private: () })
}

/// Keeps telemetry active. Logs on drop.
pub struct TelemetryGuard {
    _private: (),
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry");
    }
}
