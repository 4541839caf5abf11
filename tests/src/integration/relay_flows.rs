//! # Relay Flows
//!
//! Scrape → poll → push round trips through the real router, as Prometheus
//! and an agent would drive them.

#[cfg(test)]
mod tests {
    use super::super::harness::*;
    use axum::http::StatusCode;
    use pushprox_core::{CoordinatorApi, ID_HEADER};
    use std::time::Duration;
    use tokio::time::Instant;

    // =========================================================================
    // HAPPY PATH
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_scrape_poll_push_round_trip() {
        let relay = Relay::with_poll_timeout(Duration::from_secs(30));

        let scraper = {
            let router = relay.router.clone();
            tokio::spawn(async move {
                use tower::ServiceExt;
                router
                    .oneshot(scrape("http://node1:9100/metrics", "5"))
                    .await
                    .unwrap()
            })
        };

        let polled = relay.poll("node1").await;
        assert_eq!(polled.status(), StatusCode::OK);
        let id_header = polled.headers()[ID_HEADER].to_str().unwrap().to_string();
        let instruction = instruction(polled).await;
        assert_eq!(instruction.url.as_str(), "http://node1:9100/metrics");
        assert_eq!(instruction.headers.get(ID_HEADER), Some(id_header.as_str()));

        let pushed = relay.push(&answer(&instruction, 200, "up 1")).await;
        assert_eq!(pushed.status(), StatusCode::OK);

        let scraped = scraper.await.unwrap();
        assert_eq!(scraped.status(), StatusCode::OK);
        assert!(scraped.headers().get(ID_HEADER).is_none());
        assert_eq!(
            scraped.headers()["content-type"],
            "text/plain; version=0.0.4"
        );
        assert_eq!(body_text(scraped).await, "up 1");

        let stats = relay.coordinator.stats();
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.pending_waiters, 0);
        assert_eq!(stats.parked_tickets, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_target_status_passed_through() {
        let relay = Relay::with_poll_timeout(Duration::from_secs(30));
        let scraper = {
            let router = relay.router.clone();
            tokio::spawn(async move {
                use tower::ServiceExt;
                router
                    .oneshot(scrape("http://node1:9100/metrics", "5"))
                    .await
                    .unwrap()
            })
        };

        let instruction = instruction(relay.poll("node1").await).await;
        relay.push(&answer(&instruction, 503, "overloaded")).await;

        let scraped = scraper.await.unwrap();
        assert_eq!(scraped.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_text(scraped).await, "overloaded");
    }

    #[tokio::test(start_paused = true)]
    async fn test_uppercase_hostname_round_trip() {
        let relay = Relay::with_poll_timeout(Duration::from_secs(30));
        let scraper = {
            let router = relay.router.clone();
            tokio::spawn(async move {
                use tower::ServiceExt;
                router
                    .oneshot(scrape("http://NODE1:9100/metrics", "2"))
                    .await
                    .unwrap()
            })
        };

        let polled = relay.poll("NODE1").await;
        assert_eq!(polled.status(), StatusCode::OK);
        let instruction = instruction(polled).await;
        relay.push(&answer(&instruction, 200, "up 1")).await;

        let scraped = scraper.await.unwrap();
        assert_eq!(scraped.status(), StatusCode::OK);
        assert_eq!(body_text(scraped).await, "up 1");

        let clients = relay.send(get("/clients")).await;
        let json: serde_json::Value = serde_json::from_slice(&body_bytes(clients).await).unwrap();
        assert_eq!(json, serde_json::json!([{"targets": ["node1"], "labels": {}}]));
    }

    // =========================================================================
    // TIMEOUTS
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_poll_without_work_returns_408() {
        let relay = Relay::with_poll_timeout(Duration::from_secs(1));
        let start = Instant::now();

        let polled = relay.poll("node2").await;
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert_eq!(polled.status(), StatusCode::REQUEST_TIMEOUT);
        assert!(body_text(polled)
            .await
            .starts_with("Error WaitForScrapeInstruction: "));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scrape_without_agent_times_out() {
        let relay = Relay::with_poll_timeout(Duration::from_secs(30));
        let start = Instant::now();

        let scraped = relay
            .send(scrape("http://node1:9100/metrics", "2"))
            .await;
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        assert_eq!(scraped.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(scraped)
            .await
            .starts_with("Error scraping \"http://node1:9100/metrics\": "));

        assert!(relay.coordinator.is_mailbox_empty("node1"));
        assert_eq!(relay.coordinator.stats().enqueue_timeouts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_push_is_rejected() {
        let relay = Relay::with_poll_timeout(Duration::from_secs(30));
        let scraper = {
            let router = relay.router.clone();
            tokio::spawn(async move {
                use tower::ServiceExt;
                router
                    .oneshot(scrape("http://node1:9100/metrics", "3"))
                    .await
                    .unwrap()
            })
        };

        let instruction = instruction(relay.poll("node1").await).await;
        let scraped = scraper.await.unwrap();
        assert_eq!(scraped.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(relay.coordinator.stats().result_timeouts, 1);

        let pushed = relay.push(&answer(&instruction, 200, "up 1")).await;
        assert_eq!(pushed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(pushed).await.starts_with("Error pushing: "));
    }

    // =========================================================================
    // MALFORMED INPUT
    // =========================================================================

    #[tokio::test]
    async fn test_push_garbage_is_rejected() {
        let relay = Relay::with_poll_timeout(Duration::from_secs(1));
        let pushed = relay.send(post("/push", "definitely not http")).await;
        assert_eq!(pushed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(pushed).await.contains("malformed result"));
    }

    #[tokio::test]
    async fn test_push_for_unknown_scrape_is_rejected() {
        let relay = Relay::with_poll_timeout(Duration::from_secs(1));
        let stray = pushprox_core::ScrapeResponse::new(200, "up 1")
            .with_correlation_id(pushprox_core::CorrelationId::new());
        let pushed = relay.push(&stray).await;
        assert_eq!(pushed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(relay.coordinator.stats().unknown_results, 1);
    }

    #[tokio::test]
    async fn test_empty_poll_is_bad_request() {
        let relay = Relay::with_poll_timeout(Duration::from_secs(1));
        let polled = relay.poll("  \n").await;
        assert_eq!(polled.status(), StatusCode::BAD_REQUEST);
    }

    // =========================================================================
    // ROUTING
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_absolute_uri_is_proxied_even_on_api_path() {
        let relay = Relay::with_poll_timeout(Duration::from_secs(30));
        let scraper = {
            let router = relay.router.clone();
            tokio::spawn(async move {
                use tower::ServiceExt;
                router
                    .oneshot(post("http://node1:9100/push", "payload"))
                    .await
                    .unwrap()
            })
        };

        let instruction = instruction(relay.poll("node1").await).await;
        assert_eq!(instruction.method, "POST");
        assert_eq!(instruction.url.as_str(), "http://node1:9100/push");
        assert_eq!(&instruction.body[..], b"payload");

        relay.push(&answer(&instruction, 202, "")).await;
        assert_eq!(scraper.await.unwrap().status(), StatusCode::ACCEPTED);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clients_lists_polled_targets() {
        let relay = Relay::with_poll_timeout(Duration::from_millis(10));
        relay.poll("node2").await;
        relay.poll("node1").await;
        relay.poll("node2").await;

        let clients = relay.send(get("/clients")).await;
        assert_eq!(clients.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body_bytes(clients).await).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"targets": ["node1"], "labels": {}},
                {"targets": ["node2"], "labels": {}}
            ])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_metrics_exposes_relay_series() {
        let relay = Relay::with_poll_timeout(Duration::from_millis(10));
        relay.poll("node3").await;

        let metrics = relay.send(get("/metrics")).await;
        assert_eq!(metrics.status(), StatusCode::OK);
        let text = body_text(metrics).await;
        assert!(text.contains("pushprox_http_requests_total"));
        assert!(text.contains(r#"code="408",path="/poll""#));
        assert!(text.contains("pushprox_pending_waiters"));
        assert!(text.contains(r#"code="200",path="/metrics""#));
    }
}
