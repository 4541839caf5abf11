//! Coordinator error types.
//!
//! Every error is local to the ticket or request that produced it.

use crate::domain::correlation::CorrelationId;
use thiserror::Error;

/// Coordinator errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    /// No poller claimed the ticket before the scrape deadline.
    #[error("matching client not found for {target:?}: scrape {id} was not claimed before the deadline")]
    EnqueueTimeout { target: String, id: CorrelationId },

    /// The ticket was claimed but no result was pushed before the deadline.
    #[error("scrape {id} of {target:?} timed out waiting for the pushed result")]
    ResultTimeout { target: String, id: CorrelationId },

    /// Long poll ended without work for the target. Retryable.
    #[error("no pending scrape for {target:?}")]
    NoPendingScrape { target: String },

    /// Pushed result names an ID with no live waiter.
    #[error("channel for response {id} not found (unknown or expired)")]
    UnknownOrExpired { id: String },

    /// Pushed body could not be used as a response envelope.
    #[error("malformed result: {0}")]
    MalformedResult(String),

    /// Scrape URL has no host, or the poll body was empty.
    #[error("missing target: {0}")]
    MissingTarget(String),
}

impl CoordinatorError {
    /// Either kind of scrape deadline miss.
    pub fn is_scrape_timeout(&self) -> bool {
        matches!(self, Self::EnqueueTimeout { .. } | Self::ResultTimeout { .. })
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EnqueueTimeout { .. } => "enqueue_timeout",
            Self::ResultTimeout { .. } => "result_timeout",
            Self::NoPendingScrape { .. } => "no_pending_scrape",
            Self::UnknownOrExpired { .. } => "unknown_or_expired",
            Self::MalformedResult(_) => "malformed_result",
            Self::MissingTarget(_) => "missing_target",
        }
    }
}

/// Result type for coordinator operations
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
