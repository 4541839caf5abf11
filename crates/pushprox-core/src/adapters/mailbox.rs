//! Rendezvous Store - per-target, capacity-one ticket handoff.
//!
//! Each target owns one mailbox. A producer parks its ticket in the empty
//! slot and then waits until a poller claims it; a second producer for the
//! same target waits for the slot to free up. Mailboxes of different targets
//! share nothing but the sharded map that locates them.
//!
//! Flow:
//! 1. `enqueue()` waits for an empty slot, parks the ticket, wakes a poller
//! 2. `dequeue()` takes the ticket and acknowledges the claim under the slot lock
//! 3. `enqueue()` returns once the claim is acknowledged
//! 4. On deadline (or drop) an unclaimed ticket is withdrawn from the slot
//!
//! The slot lock is never held across an `.await`.

use crate::domain::{CorrelationId, Ticket};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{oneshot, Notify};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace};

/// Enqueue did not hand the ticket to a poller before the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no poller claimed the ticket before the deadline")]
pub struct EnqueueTimedOut;

/// A ticket sitting in a mailbox, with the channel used to acknowledge its claim.
struct Parked {
    ticket: Ticket,
    claimed: oneshot::Sender<()>,
}

#[derive(Default)]
struct Mailbox {
    slot: Mutex<Option<Parked>>,
    /// Signalled when a ticket is parked.
    filled: Notify,
    /// Signalled when the slot empties.
    vacated: Notify,
}

impl Mailbox {
    /// Remove the parked ticket if it is still `id`'s.
    fn withdraw(&self, id: CorrelationId) -> bool {
        let withdrawn = {
            let mut slot = self.slot.lock();
            match slot.as_ref() {
                Some(parked) if parked.ticket.id == id => slot.take().is_some(),
                _ => false,
            }
        };
        if withdrawn {
            self.vacated.notify_one();
        }
        withdrawn
    }

    fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }
}

/// Withdraws a parked ticket if the enqueuing future is dropped mid-wait.
struct WithdrawOnDrop {
    mailbox: Arc<Mailbox>,
    id: CorrelationId,
    armed: bool,
}

impl WithdrawOnDrop {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for WithdrawOnDrop {
    fn drop(&mut self) {
        if self.armed && self.mailbox.withdraw(self.id) {
            debug!(scrape_id = %self.id, "Withdrew ticket of cancelled scrape");
        }
    }
}

/// Per-target mailboxes.
#[derive(Default)]
pub struct RendezvousStore {
    mailboxes: DashMap<String, Arc<Mailbox>>,
}

impl RendezvousStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn mailbox(&self, target: &str) -> Arc<Mailbox> {
        if let Some(mailbox) = self.mailboxes.get(target) {
            return Arc::clone(mailbox.value());
        }
        let entry = self.mailboxes.entry(target.to_string()).or_default();
        Arc::clone(entry.value())
    }

    /// Hand `ticket` to exactly one poller of its target.
    ///
    /// Waits for the target's mailbox to empty, parks the ticket and returns
    /// once a poller has claimed it. If `deadline` passes first the ticket is
    /// withdrawn and nothing is left behind.
    pub async fn enqueue(&self, ticket: Ticket, deadline: Instant) -> Result<(), EnqueueTimedOut> {
        let mailbox = self.mailbox(&ticket.target);
        let id = ticket.id;
        let (claimed_tx, mut claimed_rx) = oneshot::channel();
        let mut pending = Some(Parked {
            ticket,
            claimed: claimed_tx,
        });

        loop {
            let vacated = mailbox.vacated.notified();
            tokio::pin!(vacated);
            // Register before checking the slot so a concurrent vacate is not lost.
            vacated.as_mut().enable();

            {
                let mut slot = mailbox.slot.lock();
                if slot.is_none() {
                    *slot = pending.take();
                }
            }

            if pending.is_none() {
                break;
            }
            trace!(scrape_id = %id, "Mailbox busy, waiting for it to free up");
            if timeout_at(deadline, vacated).await.is_err() {
                return Err(EnqueueTimedOut);
            }
        }

        mailbox.filled.notify_one();
        debug!(scrape_id = %id, "Ticket parked");

        let mut guard = WithdrawOnDrop {
            mailbox: Arc::clone(&mailbox),
            id,
            armed: true,
        };

        match timeout_at(deadline, &mut claimed_rx).await {
            Ok(Ok(())) => {
                guard.disarm();
                Ok(())
            }
            // A poller found the ticket already expired and discarded it.
            Ok(Err(_)) => {
                guard.disarm();
                Err(EnqueueTimedOut)
            }
            Err(_) => {
                guard.disarm();
                if mailbox.withdraw(id) {
                    debug!(scrape_id = %id, "Withdrew unclaimed ticket at deadline");
                    return Err(EnqueueTimedOut);
                }
                // Lost the race with a poller: the claim was acknowledged
                // under the slot lock before we could withdraw.
                match claimed_rx.try_recv() {
                    Ok(()) => Ok(()),
                    Err(_) => Err(EnqueueTimedOut),
                }
            }
        }
    }

    /// Take the target's ticket, waiting until one is parked or `deadline` passes.
    ///
    /// The ticket is removed and its claim acknowledged in one critical
    /// section, so it reaches exactly one caller.
    pub async fn dequeue(&self, target: &str, deadline: Instant) -> Option<Ticket> {
        let mailbox = self.mailbox(target);

        loop {
            let filled = mailbox.filled.notified();
            tokio::pin!(filled);
            filled.as_mut().enable();

            let (claimed, took_any) = {
                let mut slot = mailbox.slot.lock();
                match slot.take() {
                    Some(parked) if parked.ticket.is_expired(Instant::now()) => {
                        // Dropping the sender tells the producer its ticket expired.
                        debug!(scrape_id = %parked.ticket.id, "Discarded expired ticket");
                        (None, true)
                    }
                    Some(parked) => match parked.claimed.send(()) {
                        Ok(()) => (Some(parked.ticket), true),
                        // Producer is gone; the ticket has no owner left.
                        Err(()) => (None, true),
                    },
                    None => (None, false),
                }
            };

            if took_any {
                mailbox.vacated.notify_one();
            }
            if let Some(ticket) = claimed {
                debug!(scrape_id = %ticket.id, target = %ticket.target, "Ticket claimed");
                return Some(ticket);
            }
            if !took_any && timeout_at(deadline, filled).await.is_err() {
                return None;
            }
        }
    }

    /// Whether `target` has no parked ticket.
    pub fn is_empty(&self, target: &str) -> bool {
        self.mailboxes
            .get(target)
            .map_or(true, |mailbox| mailbox.is_empty())
    }

    /// Number of tickets currently parked across all targets.
    pub fn parked_count(&self) -> usize {
        self.mailboxes
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .count()
    }
}
