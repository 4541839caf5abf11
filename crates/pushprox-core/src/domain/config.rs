//! Scrape-timeout policy.
//!
//! Prometheus announces its scrape timeout in a request header; the relay
//! turns that into the deadline the coordinator works against.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Header Prometheus sets on every scrape.
pub const SCRAPE_TIMEOUT_HEADER: &str = "X-Prometheus-Scrape-Timeout-Seconds";

/// Derives the effective scrape timeout from a caller-supplied value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeTimeoutPolicy {
    /// Any requested timeout above this is clamped to it.
    pub max: Duration,
    /// Used when the scrape carries no usable timeout.
    pub default: Duration,
}

impl Default for ScrapeTimeoutPolicy {
    fn default() -> Self {
        Self {
            max: Duration::from_secs(5 * 60),
            default: Duration::from_secs(15),
        }
    }
}

impl ScrapeTimeoutPolicy {
    pub fn new(max: Duration, default: Duration) -> Self {
        Self { max, default }
    }

    /// Effective timeout for a header value given in (fractional) seconds.
    ///
    /// Absent, unparsable or non-finite values fall back to the default.
    /// The result is always within `[0, max]`.
    pub fn effective_timeout(&self, header: Option<&str>) -> Duration {
        // Clamp in f64 first: Duration::from_secs_f64 panics on huge values.
        let requested = header
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|secs| secs.is_finite())
            .map(|secs| Duration::from_secs_f64(secs.clamp(0.0, self.max.as_secs_f64())))
            .unwrap_or(self.default);

        requested.min(self.max)
    }
}
