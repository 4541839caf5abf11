#![allow(missing_docs)]

//! PushProx Proxy - the relay's HTTP front end.
//!
//! Prometheus is configured to use the relay as its HTTP proxy. Agents
//! running next to the targets long-poll `/poll` for scrapes addressed to
//! them, execute them locally and `/push` the results back.
//!
//! ```text
//!  Prometheus ──GET http://node1:9100/metrics──→ ┌──────────────┐
//!                                                │    relay     │ ←──POST /poll "node1"── agent(node1)
//!                                                │ (Coordinator)│ ──instruction──────────→     │
//!  Prometheus ←──────────response──────────────  └──────────────┘ ←──POST /push result───      │
//! ```
//!
//! # Endpoints
//!
//! | Endpoint | Purpose |
//! |----------|---------|
//! | `POST /poll` | Agent waits for a scrape instruction |
//! | `POST /push` | Agent delivers a scrape result |
//! | `GET /clients` | Known agents as Prometheus target groups |
//! | `GET /metrics` | Relay metrics |
//! | `GET /health` | Liveness and coordinator counters |
//! | absolute-form request | Scrape relayed to the agent for its host |

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod service;
pub mod wire;

pub use config::{parse_duration, parse_listen_address, ConfigError, ProxyConfig};
pub use error::ProxyError;
pub use service::{build_router, AppState, RelayService};
pub use wire::WireError;
