//! PushProx relay binary.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use pushprox_core::ScrapeTimeoutPolicy;
use pushprox_proxy::{parse_duration, parse_listen_address, ProxyConfig, RelayService};
use pushprox_telemetry::{init_telemetry, LogFormat, TelemetryConfig};

/// PushProx relay: lets Prometheus scrape targets that can only dial out
#[derive(Parser, Debug)]
#[command(name = "pushprox-proxy", version)]
#[command(about = "Relay Prometheus scrapes to agents behind NAT or firewalls")]
struct Args {
    /// Address to listen on for proxy and client requests (`:port` for all interfaces)
    #[arg(long = "web.listen-address", env = "PUSHPROX_LISTEN_ADDRESS", default_value = ":8080", value_parser = parse_listen_address)]
    listen_address: SocketAddr,

    /// Any scrape with a timeout higher than this will have to be clamped to this
    #[arg(long = "scrape.max-timeout", env = "PUSHPROX_SCRAPE_MAX_TIMEOUT", default_value = "5m", value_parser = parse_duration)]
    scrape_max_timeout: Duration,

    /// Timeout for scrapes that do not announce one
    #[arg(long = "scrape.default-timeout", env = "PUSHPROX_SCRAPE_DEFAULT_TIMEOUT", default_value = "15s", value_parser = parse_duration)]
    scrape_default_timeout: Duration,

    /// How long a poll waits for a scrape before the agent is told to retry
    #[arg(long = "poll.timeout", env = "PUSHPROX_POLL_TIMEOUT", default_value = "30s", value_parser = parse_duration)]
    poll_timeout: Duration,

    /// Log filter directive; falls back to PUSHPROX_LOG_LEVEL, then RUST_LOG
    #[arg(long = "log.level")]
    log_level: Option<String>,

    /// Log line format: logfmt or json
    #[arg(long = "log.format", env = "PUSHPROX_LOG_FORMAT")]
    log_format: Option<LogFormat>,
}

impl Args {
    fn telemetry_config(&self) -> TelemetryConfig {
        let mut config = TelemetryConfig::from_env();
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        config
    }

    fn proxy_config(&self) -> ProxyConfig {
        ProxyConfig {
            listen_address: self.listen_address,
            scrape: ScrapeTimeoutPolicy::new(self.scrape_max_timeout, self.scrape_default_timeout),
            poll_timeout: self.poll_timeout,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _telemetry = init_telemetry(args.telemetry_config()).context("initializing telemetry")?;

    let config = args.proxy_config();
    if config.scrape.default > config.scrape.max {
        warn!(
            default = ?config.scrape.default,
            max = ?config.scrape.max,
            "Default scrape timeout exceeds the maximum and will be clamped"
        );
    }

    let service = RelayService::new(config).context("invalid configuration")?;

    service
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(err = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Shutting down");
        })
        .await
        .context("relay server failed")?;

    Ok(())
}
