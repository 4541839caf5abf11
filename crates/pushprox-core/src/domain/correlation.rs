//! Correlation ID binding a poll instruction to its pushed result.
//!
//! The ID travels in the `Id` header of the instruction handed to the agent
//! and must be echoed unchanged on the pushed response.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Header carrying the correlation ID on both legs of a ticket's life.
pub const ID_HEADER: &str = "Id";

/// Opaque scrape identifier.
///
/// Backed by a UUID v7, so IDs are unique for the process lifetime and sort
/// by creation time, which keeps log lines for one scrape easy to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a fresh ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parse an ID echoed back by an agent. Surrounding whitespace is ignored.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CorrelationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
