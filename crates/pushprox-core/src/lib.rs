#![allow(missing_docs)]

//! PushProx Core - the scrape coordinator.
//!
//! Bridges a blocking scrape with the asynchronous poll/push cycle of an
//! agent that can only make outbound connections.
//!
//! # Architecture
//!
//! ```text
//!   scrape ──→ do_scrape ──register──→ WaiterRegistry ←──deliver── submit_result ←── push
//!                  │                          │
//!                  └──enqueue──→ RendezvousStore ──dequeue──→ wait_for_instruction ←── poll
//!                               (one mailbox per target)            │
//!                                                                   └──touch──→ ClientRegistry
//! ```
//!
//! - A scrape's ticket is handed to exactly one poller of its target.
//! - A result reaches its scrape at most once; late or unknown results are
//!   rejected without touching other scrapes.
//! - Every wait is bounded by a deadline, and everything a scrape registered
//!   is released on the path that ends it, including cancellation.
//!
//! # Usage
//!
//! ```ignore
//! use pushprox_core::{Coordinator, CoordinatorApi};
//!
//! let coordinator = Arc::new(Coordinator::new());
//! let response = coordinator.do_scrape(request, deadline).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::ClientRecord;
pub use domain::*;
pub use ports::{CoordinatorApi, NoopObserver, SystemTimeSource, TicketObserver, TimeSource};
pub use service::{Coordinator, CoordinatorStats, StatsSnapshot};
