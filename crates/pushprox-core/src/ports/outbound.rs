//! Outbound ports for the coordinator.

use crate::domain::TicketState;
use chrono::{DateTime, Utc};

/// Wall-clock source for client last-seen times, swappable in tests.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// System time implementation
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Notified whenever a ticket reaches a terminal state.
///
/// Keeps metric backends out of the core.
pub trait TicketObserver: Send + Sync {
    fn ticket_finished(&self, target: &str, outcome: TicketState);
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TicketObserver for NoopObserver {
    fn ticket_finished(&self, _target: &str, _outcome: TicketState) {}
}
