//! HTTP-facing errors.
//!
//! Each endpoint wraps the coordinator's error in its own variant so the
//! response text names the operation that failed.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use pushprox_core::CoordinatorError;
use pushprox_telemetry::TelemetryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Error pushing: {0}")]
    Push(CoordinatorError),

    #[error("Error WaitForScrapeInstruction: {0}")]
    Poll(CoordinatorError),

    #[error("Error scraping {url:?}: {source}")]
    Scrape {
        url: String,
        source: CoordinatorError,
    },

    #[error("Error reading request body: {0}")]
    Body(String),

    #[error("Error encoding metrics: {0}")]
    Metrics(#[from] TelemetryError),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Poll(CoordinatorError::NoPendingScrape { .. }) => StatusCode::REQUEST_TIMEOUT,
            Self::Poll(CoordinatorError::MissingTarget(_)) => StatusCode::BAD_REQUEST,
            Self::Body(_) => StatusCode::BAD_REQUEST,
            Self::Push(_) | Self::Poll(_) | Self::Scrape { .. } | Self::Metrics(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{self}\n"),
        )
            .into_response()
    }
}
