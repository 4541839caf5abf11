//! Inbound port: what the HTTP layer calls on the coordinator.

use crate::adapters::ClientRecord;
use crate::domain::{CoordinatorResult, ScrapeRequest, ScrapeResponse};
use crate::service::StatsSnapshot;
use async_trait::async_trait;
use tokio::time::Instant;

#[async_trait]
pub trait CoordinatorApi: Send + Sync {
    /// Relay `request` to the agent serving its host and wait for the result.
    async fn do_scrape(&self, request: ScrapeRequest, deadline: Instant) -> CoordinatorResult<ScrapeResponse>;

    /// Long-poll for the next scrape addressed to `target`.
    async fn wait_for_instruction(&self, target: &str, deadline: Instant) -> CoordinatorResult<ScrapeRequest>;

    /// Route an agent's result to the scrape waiting for it.
    fn submit_result(&self, response: ScrapeResponse) -> CoordinatorResult<()>;

    fn known_targets(&self) -> Vec<String>;

    fn clients(&self) -> Vec<ClientRecord>;

    fn stats(&self) -> StatsSnapshot;
}
