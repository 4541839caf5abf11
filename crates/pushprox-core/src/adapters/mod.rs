//! Concurrent state behind the coordinator.

pub mod clients;
pub mod mailbox;
pub mod waiters;

pub use clients::{ClientRecord, ClientRegistry};
pub use mailbox::{EnqueueTimedOut, RendezvousStore};
pub use waiters::{WaiterRegistry, WaiterStats};
