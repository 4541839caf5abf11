//! Prometheus metrics for the relay.
//!
//! Names keep the historical `pushprox_` / `pushproxy_` prefixes so existing
//! dashboards keep working.
//!
//! ## Metric Types
//!
//! - **Counter**: API requests by code and path, proxied scrapes by code,
//!   ticket outcomes
//! - **Gauge**: live waiters and known clients, refreshed at exposition time
//! - **Histogram**: API request latency by path

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

/// API paths with pre-initialized request series.
pub const API_PATHS: [&str; 4] = ["/push", "/poll", "/clients", "/metrics"];

/// Content type of the text exposition format.
pub const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// API requests by response code and path
    pub static ref HTTP_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("pushprox_http_requests_total", "Number of http api requests."),
        &["code", "path"]
    ).expect("metric creation failed");

    /// Proxied scrapes by response code
    pub static ref PROXIED_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("pushproxy_proxied_requests_total", "Number of http proxy requests."),
        &["code"]
    ).expect("metric creation failed");

    /// API request latency
    pub static ref HTTP_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "pushprox_http_duration_seconds",
            "Time taken by path"
        ).buckets(exponential_buckets(0.001, 2.0, 16).expect("valid buckets")),
        &["path"]
    ).expect("metric creation failed");

    /// Terminal ticket outcomes (delivered, enqueue_timeout, result_timeout, cancelled)
    pub static ref TICKETS: IntCounterVec = IntCounterVec::new(
        Opts::new("pushprox_tickets_total", "Scrape tickets by terminal outcome."),
        &["outcome"]
    ).expect("metric creation failed");

    /// Scrapes currently waiting for a result
    pub static ref PENDING_WAITERS: IntGauge = IntGauge::new(
        "pushprox_pending_waiters",
        "Number of scrapes waiting for an agent's result."
    ).expect("metric creation failed");

    /// Agents that have polled at least once
    pub static ref KNOWN_CLIENTS: IntGauge = IntGauge::new(
        "pushprox_known_clients",
        "Number of distinct agents that have polled."
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; later calls find everything registered.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(HTTP_REQUESTS.clone()),
        Box::new(PROXIED_REQUESTS.clone()),
        Box::new(HTTP_DURATION.clone()),
        Box::new(TICKETS.clone()),
        Box::new(PENDING_WAITERS.clone()),
        Box::new(KNOWN_CLIENTS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    // Expose the common series at zero before the first request.
    for path in API_PATHS {
        HTTP_REQUESTS.with_label_values(&["200", path]);
    }
    HTTP_REQUESTS.with_label_values(&["500", "/push"]);
    HTTP_REQUESTS.with_label_values(&["408", "/poll"]);

    Ok(())
}

/// Count one API request.
pub fn observe_api_request(path: &str, code: u16, elapsed_secs: f64) {
    HTTP_REQUESTS
        .with_label_values(&[&code.to_string(), path])
        .inc();
    HTTP_DURATION.with_label_values(&[path]).observe(elapsed_secs);
}

/// Count one proxied scrape.
pub fn observe_proxied_request(code: u16) {
    PROXIED_REQUESTS.with_label_values(&[&code.to_string()]).inc();
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
