//! Ticket: one unit of pending scrape work.
//!
//! ```text
//! Created ──→ Enqueued ──→ Claimed ──→ Delivered
//!    │            │            └──────→ ResultTimeout
//!    │            ├──────────────────→ EnqueueTimeout
//!    └────────────┴──────────────────→ Cancelled
//! ```

use crate::domain::correlation::CorrelationId;
use crate::domain::envelope::ScrapeRequest;
use serde::Serialize;
use std::fmt;
use tokio::time::Instant;

/// A scrape request waiting for (or held by) an agent.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub id: CorrelationId,
    pub target: String,
    pub request: ScrapeRequest,
    pub created_at: Instant,
    pub deadline: Instant,
}

impl Ticket {
    pub fn new(id: CorrelationId, target: impl Into<String>, request: ScrapeRequest, deadline: Instant) -> Self {
        Self {
            id,
            target: target.into(),
            request,
            created_at: Instant::now(),
            deadline,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }
}

/// Lifecycle of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketState {
    Created,
    Enqueued,
    Claimed,
    Delivered,
    EnqueueTimeout,
    ResultTimeout,
    Cancelled,
}

impl TicketState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Delivered | Self::EnqueueTimeout | Self::ResultTimeout | Self::Cancelled
        )
    }

    pub fn can_transition_to(self, next: TicketState) -> bool {
        use TicketState::*;
        matches!(
            (self, next),
            (Created, Enqueued)
                | (Created, Cancelled)
                | (Enqueued, Claimed)
                | (Enqueued, EnqueueTimeout)
                | (Enqueued, Cancelled)
                | (Claimed, Delivered)
                | (Claimed, ResultTimeout)
                | (Claimed, Cancelled)
        )
    }

    /// Label used for logs and the outcome metric.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Enqueued => "enqueued",
            Self::Claimed => "claimed",
            Self::Delivered => "delivered",
            Self::EnqueueTimeout => "enqueue_timeout",
            Self::ResultTimeout => "result_timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TicketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
