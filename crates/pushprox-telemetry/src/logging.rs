//! Structured logging.
//!
//! One global `tracing` subscriber with an `EnvFilter`; lines are either
//! human-readable or JSON, with the structured fields (`scrape_id`,
//! `target`, `url`, `err`) kept as fields in both.

use crate::config::{LogFormat, TelemetryConfig};
use crate::TelemetryError;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Fails if one is already set.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::Config(format!("invalid log filter {:?}: {e}", config.log_level)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target);

    let installed = match config.log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Logfmt => builder.try_init(),
    };
    installed.map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    tracing::debug!(
        log_level = %config.log_level,
        log_format = %config.log_format,
        "Logging initialized"
    );
    Ok(())
}
