//! Client Registry - which targets have polled, and when.
//!
//! Entries never expire; the set is bounded by the number of distinct agents.

use crate::ports::outbound::TimeSource;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;

/// A known agent and the time its last poll completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientRecord {
    pub target: String,
    pub last_seen: DateTime<Utc>,
}

pub struct ClientRegistry {
    last_seen: DashMap<String, DateTime<Utc>>,
    clock: Arc<dyn TimeSource>,
}

impl ClientRegistry {
    pub fn new(clock: Arc<dyn TimeSource>) -> Self {
        Self {
            last_seen: DashMap::new(),
            clock,
        }
    }

    /// Record that `target` was just seen.
    pub fn touch(&self, target: &str) {
        let now = self.clock.now();
        self.last_seen.insert(target.to_string(), now);
    }

    /// All targets that have polled at least once, sorted.
    pub fn known_targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self.last_seen.iter().map(|e| e.key().clone()).collect();
        targets.sort_unstable();
        targets
    }

    /// Sorted snapshot with last-seen times.
    pub fn clients(&self) -> Vec<ClientRecord> {
        let mut clients: Vec<ClientRecord> = self
            .last_seen
            .iter()
            .map(|e| ClientRecord {
                target: e.key().clone(),
                last_seen: *e.value(),
            })
            .collect();
        clients.sort_unstable_by(|a, b| a.target.cmp(&b.target));
        clients
    }

    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }
}
