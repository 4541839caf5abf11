//! Middleware stack for the relay.
//!
//! Layer order: Request → Tracing → (proxy dispatch | ApiMetrics → Handler)

pub mod metrics;
pub mod tracing;

pub use self::metrics::{ApiMetricsLayer, PrometheusTicketObserver};
pub use self::tracing::TracingLayer;
