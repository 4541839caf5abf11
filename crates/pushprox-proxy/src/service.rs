//! Relay service - router construction and the HTTP server loop.

use crate::config::{ConfigError, ProxyConfig};
use crate::handlers::{self, MAX_BODY_BYTES};
use crate::middleware::{ApiMetricsLayer, PrometheusTicketObserver, TracingLayer};
use axum::{
    extract::{DefaultBodyLimit, Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use pushprox_core::{
    Coordinator, CoordinatorApi, ScrapeTimeoutPolicy, SystemTimeSource,
};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::info;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<dyn CoordinatorApi>,
    pub scrape_timeouts: ScrapeTimeoutPolicy,
    pub poll_timeout: Duration,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(coordinator: Arc<dyn CoordinatorApi>, config: &ProxyConfig) -> Self {
        Self {
            coordinator,
            scrape_timeouts: config.scrape,
            poll_timeout: config.poll_timeout,
            started_at: Instant::now(),
        }
    }
}

/// Build the relay's router.
///
/// Absolute-form requests are scrapes to relay, whatever their path; the
/// rest are API calls.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/push", post(handlers::push))
        .route("/poll", post(handlers::poll))
        .route("/clients", get(handlers::clients))
        .route("/metrics", get(handlers::metrics))
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(ApiMetricsLayer::new())
        .with_state(state.clone());

    Router::new()
        .fallback_service(api)
        .layer(middleware::from_fn_with_state(state, dispatch))
        .layer(TracingLayer::new())
}

async fn dispatch(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if req.uri().authority().is_some() {
        handlers::proxy(State(state), req).await
    } else {
        next.run(req).await
    }
}

/// The relay: one coordinator behind one HTTP listener.
pub struct RelayService {
    config: ProxyConfig,
    coordinator: Arc<Coordinator>,
}

impl RelayService {
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let coordinator = Arc::new(Coordinator::with_ports(
            Arc::new(SystemTimeSource),
            Arc::new(PrometheusTicketObserver),
        ));

        Ok(Self {
            config,
            coordinator,
        })
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn coordinator(&self) -> Arc<Coordinator> {
        Arc::clone(&self.coordinator)
    }

    pub fn router(&self) -> Router {
        let coordinator: Arc<dyn CoordinatorApi> = self.coordinator.clone();
        build_router(AppState::new(coordinator, &self.config))
    }

    /// Serve until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.listen_address).await?;
        info!(
            address = %listener.local_addr()?,
            max_scrape_timeout = ?self.config.scrape.max,
            default_scrape_timeout = ?self.config.scrape.default,
            "Listening"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
    }
}
