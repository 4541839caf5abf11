//! Prometheus instrumentation for the API endpoints and ticket outcomes.

use axum::{body::Body, http::Request, response::Response};
use pushprox_core::{TicketObserver, TicketState};
use pushprox_telemetry::metrics::{self, API_PATHS};
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};

/// Counts requests and latency per API path.
///
/// Paths outside [`API_PATHS`] pass through uncounted so unknown URLs cannot
/// grow the label set.
#[derive(Clone, Default)]
pub struct ApiMetricsLayer;

impl ApiMetricsLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for ApiMetricsLayer {
    type Service = ApiMetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ApiMetricsService { inner }
    }
}

#[derive(Clone)]
pub struct ApiMetricsService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for ApiMetricsService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let path = API_PATHS
            .iter()
            .copied()
            .find(|p| *p == req.uri().path());

        Box::pin(async move {
            let start = Instant::now();
            let result = inner.call(req).await;
            if let (Some(path), Ok(response)) = (path, &result) {
                metrics::observe_api_request(
                    path,
                    response.status().as_u16(),
                    start.elapsed().as_secs_f64(),
                );
            }
            result
        })
    }
}

/// Feeds terminal ticket outcomes into `pushprox_tickets_total`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusTicketObserver;

impl TicketObserver for PrometheusTicketObserver {
    fn ticket_finished(&self, _target: &str, outcome: TicketState) {
        metrics::TICKETS.with_label_values(&[outcome.as_str()]).inc();
    }
}
