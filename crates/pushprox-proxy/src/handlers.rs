//! Endpoint handlers.
//!
//! `/push`, `/poll` and `/clients` form the agent protocol; `/metrics` and
//! `/health` are for operators. Everything in absolute form goes to
//! [`proxy`].

use crate::error::ProxyError;
use crate::service::AppState;
use crate::wire;
use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use pushprox_core::{
    CoordinatorError, Headers, ScrapeRequest, ScrapeResponse, StatsSnapshot, ID_HEADER,
    SCRAPE_TIMEOUT_HEADER,
};
use pushprox_telemetry::metrics::{self as telemetry, METRICS_CONTENT_TYPE};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::time::Instant;
use tracing::{info, warn};
use url::Url;

/// Upper bound on any request body the relay buffers.
pub const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Headers that describe one hop and are never forwarded.
const HOP_BY_HOP: [&str; 5] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "transfer-encoding",
    "content-length",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// `POST /push`: an agent delivers a scrape result.
pub async fn push(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ProxyError> {
    let mut response = wire::decode_response(&body).map_err(|e| {
        warn!(err = %e, "Unparsable push body");
        ProxyError::Push(CoordinatorError::MalformedResult(e.to_string()))
    })?;

    // Older agents only set the ID on the outer request.
    if response.raw_correlation_id().is_none() {
        if let Some(id) = headers.get(ID_HEADER).and_then(|v| v.to_str().ok()) {
            response.headers.insert(ID_HEADER, id);
        }
    }

    let scrape_id = response.raw_correlation_id().unwrap_or_default().to_string();
    state.coordinator.submit_result(response).map_err(|err| {
        warn!(scrape_id = %scrape_id, err = %err, "Error pushing");
        ProxyError::Push(err)
    })?;

    info!(scrape_id = %scrape_id, "Pushed result");
    Ok(StatusCode::OK)
}

/// `POST /poll`: an agent waits for its next scrape. The body names the agent.
pub async fn poll(State(state): State<AppState>, body: Bytes) -> Result<Response, ProxyError> {
    let target = String::from_utf8_lossy(&body);
    let deadline = Instant::now() + state.poll_timeout;

    let request = state
        .coordinator
        .wait_for_instruction(&target, deadline)
        .await
        .map_err(ProxyError::Poll)?;

    let scrape_id = request.headers.get(ID_HEADER).unwrap_or_default();
    info!(scrape_id, target = %target.trim(), url = %request.url, "Responded to poll");

    let mut response = Response::new(Body::from(wire::encode_request(&request)));
    if let Ok(value) = HeaderValue::from_str(scrape_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static("id"), value);
    }
    Ok(response)
}

/// Prometheus file-SD style target group.
#[derive(Debug, Serialize)]
pub struct TargetGroup {
    pub targets: Vec<String>,
    pub labels: BTreeMap<String, String>,
}

/// `GET /clients`: one target group per agent that has polled.
pub async fn clients(State(state): State<AppState>) -> Json<Vec<TargetGroup>> {
    let groups = state
        .coordinator
        .known_targets()
        .into_iter()
        .map(|target| TargetGroup {
            targets: vec![target],
            labels: BTreeMap::new(),
        })
        .collect();
    Json(groups)
}

/// `GET /metrics`
pub async fn metrics(State(state): State<AppState>) -> Result<Response, ProxyError> {
    let stats = state.coordinator.stats();
    telemetry::PENDING_WAITERS.set(i64::try_from(stats.pending_waiters).unwrap_or(i64::MAX));
    telemetry::KNOWN_CLIENTS.set(i64::try_from(stats.known_clients).unwrap_or(i64::MAX));

    let body = telemetry::encode_metrics()?;
    Ok(([(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)], body).into_response())
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub coordinator: StatsSnapshot,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        coordinator: state.coordinator.stats(),
    })
}

pub async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "404 page not found\n")
}

/// Relay an absolute-form request to the agent serving its host.
pub async fn proxy(State(state): State<AppState>, req: Request) -> Response {
    let url = req.uri().to_string();
    let response = match scrape(&state, req).await {
        Ok(response) => response,
        Err(err) => {
            warn!(url = %url, err = %err, "Scrape failed");
            err.into_response()
        }
    };
    telemetry::observe_proxied_request(response.status().as_u16());
    response
}

async fn scrape(state: &AppState, req: Request) -> Result<Response, ProxyError> {
    let (parts, body) = req.into_parts();
    let url_text = parts.uri.to_string();
    let scrape_error = |source| ProxyError::Scrape {
        url: url_text.clone(),
        source,
    };

    let url = Url::parse(&url_text)
        .map_err(|e| scrape_error(CoordinatorError::MissingTarget(e.to_string())))?;
    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| ProxyError::Body(e.to_string()))?;

    let headers: Headers = parts
        .headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
        .collect();

    let timeout = state.scrape_timeouts.effective_timeout(
        parts
            .headers
            .get(SCRAPE_TIMEOUT_HEADER)
            .and_then(|v| v.to_str().ok()),
    );

    let request = ScrapeRequest {
        method: parts.method.to_string(),
        url,
        headers,
        body,
    };

    let scraped = state
        .coordinator
        .do_scrape(request, Instant::now() + timeout)
        .await
        .map_err(scrape_error)?;

    info!(url = %url_text, status = scraped.status, "Responded to scrape");
    Ok(into_http_response(scraped))
}

/// Copy the target's response back verbatim, minus hop-by-hop framing.
fn into_http_response(scraped: ScrapeResponse) -> Response {
    let status = StatusCode::from_u16(scraped.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = Response::new(Body::from(scraped.body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, value) in scraped.headers.iter() {
        if is_hop_by_hop(name) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.append(name, value);
        }
    }
    response
}
