//! Relay configuration.
//!
//! Built once from command-line flags and immutable afterwards.

use pushprox_core::ScrapeTimeoutPolicy;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid listen address {0:?}")]
    InvalidListenAddress(String),

    #[error("invalid duration {value:?}: {reason}")]
    InvalidDuration { value: String, reason: String },

    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub listen_address: SocketAddr,
    pub scrape: ScrapeTimeoutPolicy,
    /// How long `/poll` waits for work before answering 408.
    pub poll_timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080),
            scrape: ScrapeTimeoutPolicy::default(),
            poll_timeout: Duration::from_secs(30),
        }
    }
}

impl ProxyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scrape.max.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "scrape max timeout cannot be 0".into(),
            ));
        }
        if self.scrape.default.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "scrape default timeout cannot be 0".into(),
            ));
        }
        if self.poll_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("poll timeout cannot be 0".into()));
        }
        Ok(())
    }
}

/// Parse a listen address; `:port` binds every interface.
pub fn parse_listen_address(s: &str) -> Result<SocketAddr, ConfigError> {
    let s = s.trim();
    let invalid = || ConfigError::InvalidListenAddress(s.to_string());

    if let Some(port) = s.strip_prefix(':') {
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }
    if let Some(port) = s.strip_prefix("localhost:") {
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port));
    }
    s.parse().map_err(|_| invalid())
}

/// Parse a duration such as `30s`, `5m` or `1m30s`. A bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::InvalidDuration {
            value: s.to_string(),
            reason: e.to_string(),
        });
    }
    humantime::parse_duration(s).map_err(|e| ConfigError::InvalidDuration {
        value: s.to_string(),
        reason: e.to_string(),
    })
}
