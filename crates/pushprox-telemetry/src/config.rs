//! Telemetry configuration from environment variables.

use crate::TelemetryError;
use std::env;
use std::fmt;
use std::str::FromStr;

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable key=value lines
    #[default]
    Logfmt,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "logfmt" => Ok(Self::Logfmt),
            "json" => Ok(Self::Json),
            other => Err(TelemetryError::Config(format!(
                "unknown log format {other:?} (expected logfmt or json)"
            ))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Logfmt => "logfmt",
            Self::Json => "json",
        })
    }
}

/// Configuration for logging and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// `tracing` filter directive (e.g. `info`, `pushprox_core=debug`)
    pub log_level: String,

    pub log_format: LogFormat,

    /// Include span/target names in log lines
    pub with_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Logfmt,
            with_target: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PUSHPROX_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `PUSHPROX_LOG_FORMAT`: `logfmt` or `json` (default: logfmt)
    /// - `PUSHPROX_LOG_TARGET`: Include targets (default: true)
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("PUSHPROX_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            log_format: env::var("PUSHPROX_LOG_FORMAT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),

            with_target: env::var("PUSHPROX_LOG_TARGET")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),
        }
    }
}
