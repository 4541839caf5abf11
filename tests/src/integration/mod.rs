//! Cross-crate integration tests.

pub mod harness;

mod coordinator_races;
mod relay_flows;
