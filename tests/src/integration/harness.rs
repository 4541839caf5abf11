//! Helpers for driving the relay router in-process.

use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use axum::Router;
use bytes::Bytes;
use pushprox_core::{Coordinator, ScrapeRequest, ScrapeResponse, SCRAPE_TIMEOUT_HEADER};
use pushprox_proxy::{wire, ProxyConfig, RelayService};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// A relay router plus a handle on its coordinator.
pub struct Relay {
    pub router: Router,
    pub coordinator: Arc<Coordinator>,
}

impl Relay {
    pub fn with_poll_timeout(poll_timeout: Duration) -> Self {
        let _ = pushprox_telemetry::register_metrics();
        let config = ProxyConfig {
            poll_timeout,
            ..ProxyConfig::default()
        };
        let service = RelayService::new(config).expect("valid test config");
        Self {
            router: service.router(),
            coordinator: service.coordinator(),
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// Poll as agent `target`.
    pub async fn poll(&self, target: &str) -> Response<Body> {
        self.send(post("/poll", target.to_string())).await
    }

    /// Push `response` as an agent would.
    pub async fn push(&self, response: &ScrapeResponse) -> Response<Body> {
        self.send(post("/push", wire::encode_response(response))).await
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("valid request")
}

pub fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::post(uri).body(body.into()).expect("valid request")
}

/// A scrape as Prometheus sends it to its proxy: absolute URI plus timeout header.
pub fn scrape(url: &str, timeout_secs: &str) -> Request<Body> {
    Request::get(url)
        .header(SCRAPE_TIMEOUT_HEADER, timeout_secs)
        .body(Body::empty())
        .expect("valid request")
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable")
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8_lossy(&body_bytes(response).await).into_owned()
}

/// Decode the instruction returned by a successful poll.
pub async fn instruction(poll_response: Response<Body>) -> ScrapeRequest {
    let body = body_bytes(poll_response).await;
    wire::decode_request(&body).expect("poll body is a serialized request")
}

/// The agent's answer to `instruction`, carrying its scrape ID.
pub fn answer(instruction: &ScrapeRequest, status: u16, body: &'static str) -> ScrapeResponse {
    let id = instruction
        .correlation_id()
        .expect("instruction carries an Id header");
    let mut response = ScrapeResponse::new(status, body).with_correlation_id(id);
    response.headers.append("Content-Type", "text/plain; version=0.0.4");
    response
}
