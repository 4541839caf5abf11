//! Ports (hexagonal architecture boundaries).

pub mod inbound;
pub mod outbound;

pub use inbound::CoordinatorApi;
pub use outbound::{NoopObserver, SystemTimeSource, TicketObserver, TimeSource};
