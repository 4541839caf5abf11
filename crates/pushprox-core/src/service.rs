//! Coordinator service - the rendezvous between scrapes and agent polls.
//!
//! One instance is built at startup and shared behind an `Arc`. All state is
//! sharded per key; there is no coordinator-wide lock.

use crate::adapters::{ClientRecord, ClientRegistry, RendezvousStore, WaiterRegistry};
use crate::domain::{
    normalize_target, CoordinatorError, CoordinatorResult, CorrelationId, ScrapeRequest,
    ScrapeResponse, Ticket, TicketState,
};
use crate::ports::{CoordinatorApi, NoopObserver, SystemTimeSource, TicketObserver, TimeSource};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

/// Lifetime counters for the coordinator
#[derive(Debug, Default)]
pub struct CoordinatorStats {
    pub tickets_created: AtomicU64,
    pub delivered: AtomicU64,
    pub enqueue_timeouts: AtomicU64,
    pub result_timeouts: AtomicU64,
    pub cancelled: AtomicU64,
    pub unknown_results: AtomicU64,
    pub empty_polls: AtomicU64,
}

impl CoordinatorStats {
    fn record(&self, outcome: TicketState) {
        let counter = match outcome {
            TicketState::Delivered => &self.delivered,
            TicketState::EnqueueTimeout => &self.enqueue_timeouts,
            TicketState::ResultTimeout => &self.result_timeouts,
            TicketState::Cancelled => &self.cancelled,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time copy of the coordinator's counters and gauges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub tickets_created: u64,
    pub delivered: u64,
    pub enqueue_timeouts: u64,
    pub result_timeouts: u64,
    pub cancelled: u64,
    pub unknown_results: u64,
    pub empty_polls: u64,
    pub pending_waiters: usize,
    pub parked_tickets: usize,
    pub known_clients: usize,
}

pub struct Coordinator {
    mailboxes: RendezvousStore,
    waiters: WaiterRegistry,
    clients: ClientRegistry,
    observer: Arc<dyn TicketObserver>,
    stats: CoordinatorStats,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    pub fn new() -> Self {
        Self::with_ports(Arc::new(SystemTimeSource), Arc::new(NoopObserver))
    }

    pub fn with_ports(clock: Arc<dyn TimeSource>, observer: Arc<dyn TicketObserver>) -> Self {
        Self {
            mailboxes: RendezvousStore::new(),
            waiters: WaiterRegistry::new(),
            clients: ClientRegistry::new(clock),
            observer,
            stats: CoordinatorStats::default(),
        }
    }

    pub fn pending_waiters(&self) -> usize {
        self.waiters.pending_count()
    }

    pub fn parked_tickets(&self) -> usize {
        self.mailboxes.parked_count()
    }

    /// Whether `target`'s mailbox is empty.
    pub fn is_mailbox_empty(&self, target: &str) -> bool {
        self.mailboxes.is_empty(target)
    }
}

/// Tracks one scrape's ticket through its states.
///
/// Whatever path ends the scrape, the waiter is deregistered and the
/// outcome recorded exactly once. Dropped before a terminal state means the
/// caller went away.
struct ScrapeGuard<'a> {
    coordinator: &'a Coordinator,
    id: CorrelationId,
    target: String,
    state: TicketState,
}

impl<'a> ScrapeGuard<'a> {
    fn advance(&mut self, next: TicketState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid ticket transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
    }

    fn finish(&mut self, outcome: TicketState) {
        self.advance(outcome);
        let coordinator = self.coordinator;
        coordinator.waiters.deregister(self.id);
        coordinator.stats.record(outcome);
        coordinator.observer.ticket_finished(&self.target, outcome);
    }
}

impl Drop for ScrapeGuard<'_> {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            debug!(scrape_id = %self.id, target = %self.target, state = %self.state, "Scrape cancelled");
            self.finish(TicketState::Cancelled);
        }
    }
}

#[async_trait]
impl CoordinatorApi for Coordinator {
    async fn do_scrape(&self, request: ScrapeRequest, deadline: Instant) -> CoordinatorResult<ScrapeResponse> {
        let target = request
            .target()
            .ok_or_else(|| CoordinatorError::MissingTarget(format!("no host in {}", request.url)))?;

        let id = CorrelationId::new();
        let request = request.with_correlation_id(id);

        // Register before the ticket can be seen by any poller.
        let result_rx = self.waiters.register(id, &target);
        self.stats.tickets_created.fetch_add(1, Ordering::Relaxed);

        let mut guard = ScrapeGuard {
            coordinator: self,
            id,
            target: target.clone(),
            state: TicketState::Created,
        };

        let ticket = Ticket::new(id, target.clone(), request, deadline);
        guard.advance(TicketState::Enqueued);
        if self.mailboxes.enqueue(ticket, deadline).await.is_err() {
            guard.finish(TicketState::EnqueueTimeout);
            info!(scrape_id = %id, target = %target, "No agent claimed scrape before the deadline");
            return Err(CoordinatorError::EnqueueTimeout { target, id });
        }
        guard.advance(TicketState::Claimed);

        match timeout_at(deadline, result_rx).await {
            Ok(Ok(response)) => {
                guard.finish(TicketState::Delivered);
                debug!(scrape_id = %id, target = %target, status = response.status, "Scrape delivered");
                Ok(response)
            }
            // Only a deregistration drops the sender, and only this guard deregisters.
            Ok(Err(_)) | Err(_) => {
                guard.finish(TicketState::ResultTimeout);
                info!(scrape_id = %id, target = %target, "Agent did not push a result before the deadline");
                Err(CoordinatorError::ResultTimeout { target, id })
            }
        }
    }

    async fn wait_for_instruction(&self, target: &str, deadline: Instant) -> CoordinatorResult<ScrapeRequest> {
        let target = normalize_target(target);
        if target.is_empty() {
            return Err(CoordinatorError::MissingTarget("empty poll target".to_string()));
        }

        let claimed = self.mailboxes.dequeue(&target, deadline).await;
        self.clients.touch(&target);

        match claimed {
            Some(ticket) => {
                debug!(scrape_id = %ticket.id, target = %target, "Handed scrape to agent");
                Ok(ticket.request)
            }
            None => {
                self.stats.empty_polls.fetch_add(1, Ordering::Relaxed);
                Err(CoordinatorError::NoPendingScrape { target })
            }
        }
    }

    fn submit_result(&self, mut response: ScrapeResponse) -> CoordinatorResult<()> {
        let raw = response
            .take_correlation_id()
            .ok_or_else(|| CoordinatorError::MalformedResult("missing Id header".to_string()))?;
        let id = CorrelationId::parse(&raw)
            .map_err(|e| CoordinatorError::MalformedResult(format!("invalid Id {raw:?}: {e}")))?;

        self.waiters.deliver(id, response).inspect_err(|err| {
            self.stats.unknown_results.fetch_add(1, Ordering::Relaxed);
            warn!(scrape_id = %id, err = %err, "Dropping pushed result");
        })
    }

    fn known_targets(&self) -> Vec<String> {
        self.clients.known_targets()
    }

    fn clients(&self) -> Vec<ClientRecord> {
        self.clients.clients()
    }

    fn stats(&self) -> StatsSnapshot {
        let s = &self.stats;
        StatsSnapshot {
            tickets_created: s.tickets_created.load(Ordering::Relaxed),
            delivered: s.delivered.load(Ordering::Relaxed),
            enqueue_timeouts: s.enqueue_timeouts.load(Ordering::Relaxed),
            result_timeouts: s.result_timeouts.load(Ordering::Relaxed),
            cancelled: s.cancelled.load(Ordering::Relaxed),
            unknown_results: s.unknown_results.load(Ordering::Relaxed),
            empty_polls: s.empty_polls.load(Ordering::Relaxed),
            pending_waiters: self.waiters.pending_count(),
            parked_tickets: self.mailboxes.parked_count(),
            known_clients: self.clients.len(),
        }
    }
}
