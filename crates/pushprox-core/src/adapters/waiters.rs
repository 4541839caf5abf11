//! Waiter Registry - maps scrape IDs to the scrape blocked on their result.
//!
//! Flow:
//! 1. The orchestrator calls `register()` before the ticket is enqueued
//! 2. An agent's push calls `deliver()` with the result
//! 3. The orchestrator awaits the receiver or times out
//! 4. Whatever the outcome, the orchestrator's guard calls `deregister()`
//!
//! An entry is removed on first delivery, so a result reaches its waiter at
//! most once and a late or duplicate push finds nothing.

use crate::domain::{CoordinatorError, CoordinatorResult, CorrelationId, ScrapeResponse};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

struct Waiter {
    sender: oneshot::Sender<ScrapeResponse>,
    registered_at: Instant,
    target: String,
}

/// Statistics for the waiter registry
#[derive(Debug, Default)]
pub struct WaiterStats {
    pub total_registered: AtomicU64,
    pub total_delivered: AtomicU64,
    /// Pushes whose ID had no live waiter
    pub total_unmatched: AtomicU64,
    /// Waiters removed without a delivery
    pub total_abandoned: AtomicU64,
}

#[derive(Default)]
pub struct WaiterRegistry {
    waiters: DashMap<CorrelationId, Waiter>,
    stats: WaiterStats,
}

impl WaiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `id` and get the receiver its result arrives on.
    pub fn register(&self, id: CorrelationId, target: &str) -> oneshot::Receiver<ScrapeResponse> {
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(
            id,
            Waiter {
                sender: tx,
                registered_at: Instant::now(),
                target: target.to_string(),
            },
        );
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);
        debug!(scrape_id = %id, target, "Registered waiter");
        rx
    }

    /// Hand `response` to the waiter registered under `id`.
    ///
    /// Fails with `UnknownOrExpired` when no waiter exists or it has already
    /// given up.
    pub fn deliver(&self, id: CorrelationId, response: ScrapeResponse) -> CoordinatorResult<()> {
        let Some((_, waiter)) = self.waiters.remove(&id) else {
            self.stats.total_unmatched.fetch_add(1, Ordering::Relaxed);
            warn!(scrape_id = %id, "Result for unknown or expired scrape");
            return Err(CoordinatorError::UnknownOrExpired { id: id.to_string() });
        };

        let elapsed = waiter.registered_at.elapsed();
        match waiter.sender.send(response) {
            Ok(()) => {
                self.stats.total_delivered.fetch_add(1, Ordering::Relaxed);
                debug!(
                    scrape_id = %id,
                    target = %waiter.target,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Delivered result"
                );
                Ok(())
            }
            Err(_) => {
                // Scrape gave up between our lookup and the send.
                self.stats.total_unmatched.fetch_add(1, Ordering::Relaxed);
                debug!(scrape_id = %id, "Waiter dropped before delivery");
                Err(CoordinatorError::UnknownOrExpired { id: id.to_string() })
            }
        }
    }

    /// Remove the waiter for `id` if it is still registered. Idempotent.
    pub fn deregister(&self, id: CorrelationId) -> bool {
        let removed = self.waiters.remove(&id).is_some();
        if removed {
            self.stats.total_abandoned.fetch_add(1, Ordering::Relaxed);
            debug!(scrape_id = %id, "Deregistered waiter");
        }
        removed
    }

    pub fn pending_count(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_pending(&self, id: CorrelationId) -> bool {
        self.waiters.contains_key(&id)
    }

    pub fn stats(&self) -> &WaiterStats {
        &self.stats
    }
}
