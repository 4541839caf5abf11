//! Domain types for the coordinator.
//!
//! Envelopes, tickets, correlation IDs, errors and the timeout policy.
//! Async infrastructure (mailboxes, waiters) lives in the adapters layer.

pub mod config;
pub mod correlation;
pub mod envelope;
pub mod error;
pub mod ticket;

pub use config::{ScrapeTimeoutPolicy, SCRAPE_TIMEOUT_HEADER};
pub use correlation::{CorrelationId, ID_HEADER};
pub use envelope::{normalize_target, Headers, ScrapeRequest, ScrapeResponse};
pub use error::{CoordinatorError, CoordinatorResult};
pub use ticket::{Ticket, TicketState};
