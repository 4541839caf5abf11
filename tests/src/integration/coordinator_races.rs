//! # Coordinator Races
//!
//! Many scrapes and many agents hitting the same coordinator at once.
//! Every scrape must get exactly its own result, and nothing may leak.

#[cfg(test)]
mod tests {
    use pushprox_core::{
        Coordinator, CoordinatorApi, CoordinatorError, ScrapeRequest, ScrapeResponse,
    };
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;
    use url::Url;

    fn scrape(url: &str) -> ScrapeRequest {
        ScrapeRequest::get(Url::parse(url).unwrap())
    }

    fn after(d: Duration) -> Instant {
        Instant::now() + d
    }

    /// Agent loop: claim work for `target` and echo the URL query back
    /// until `answered` reaches `total`.
    async fn run_agent(
        coordinator: Arc<Coordinator>,
        target: &'static str,
        answered: Arc<AtomicUsize>,
        total: usize,
    ) -> usize {
        let mut handled = 0;
        while answered.load(Ordering::SeqCst) < total {
            let instruction = match coordinator
                .wait_for_instruction(target, after(Duration::from_millis(200)))
                .await
            {
                Ok(instruction) => instruction,
                Err(CoordinatorError::NoPendingScrape { .. }) => continue,
                Err(e) => panic!("unexpected poll error: {e}"),
            };

            let jitter = rand::random::<u64>() % 5;
            tokio::time::sleep(Duration::from_millis(jitter)).await;

            let body = instruction.url.query().unwrap_or_default().to_string();
            let id = instruction.correlation_id().unwrap();
            coordinator
                .submit_result(ScrapeResponse::new(200, body).with_correlation_id(id))
                .unwrap();
            answered.fetch_add(1, Ordering::SeqCst);
            handled += 1;
        }
        handled
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_scrapes_each_get_their_own_result() {
        const SCRAPES: usize = 20;
        let coordinator = Arc::new(Coordinator::new());
        let answered = Arc::new(AtomicUsize::new(0));

        let agents: Vec<_> = (0..4)
            .map(|_| {
                tokio::spawn(run_agent(
                    Arc::clone(&coordinator),
                    "node1",
                    Arc::clone(&answered),
                    SCRAPES,
                ))
            })
            .collect();

        let scrapes: Vec<_> = (0..SCRAPES)
            .map(|i| {
                let c = Arc::clone(&coordinator);
                tokio::spawn(async move {
                    let url = format!("http://node1:9100/metrics?scrape={i}");
                    let response = c
                        .do_scrape(scrape(&url), after(Duration::from_secs(10)))
                        .await
                        .expect("scrape answered");
                    (i, response)
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in scrapes {
            let (i, response) = handle.await.unwrap();
            assert_eq!(response.body, format!("scrape={i}").into_bytes());
            assert!(seen.insert(i));
        }

        let handled: usize = total_handled(agents).await;
        assert_eq!(handled, SCRAPES);

        let stats = coordinator.stats();
        assert_eq!(stats.tickets_created, SCRAPES as u64);
        assert_eq!(stats.delivered, SCRAPES as u64);
        assert_eq!(stats.pending_waiters, 0);
        assert_eq!(stats.parked_tickets, 0);
    }

    async fn total_handled(handles: Vec<tokio::task::JoinHandle<usize>>) -> usize {
        let mut total = 0;
        for handle in handles {
            total += handle.await.unwrap();
        }
        total
    }

    #[tokio::test(start_paused = true)]
    async fn test_targets_do_not_block_each_other() {
        let coordinator = Arc::new(Coordinator::new());

        // node1 has no agent; its scrape sits in the mailbox until the deadline.
        let stuck = {
            let c = Arc::clone(&coordinator);
            tokio::spawn(async move {
                c.do_scrape(scrape("http://node1:9100/metrics"), after(Duration::from_secs(10)))
                    .await
            })
        };
        let served = {
            let c = Arc::clone(&coordinator);
            tokio::spawn(async move {
                c.do_scrape(scrape("http://node2:9100/metrics"), after(Duration::from_secs(10)))
                    .await
            })
        };

        let start = Instant::now();
        let instruction = coordinator
            .wait_for_instruction("node2", after(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(instruction.target().as_deref(), Some("node2"));
        let id = instruction.correlation_id().unwrap();
        coordinator
            .submit_result(ScrapeResponse::new(200, "up 1").with_correlation_id(id))
            .unwrap();

        assert_eq!(&served.await.unwrap().unwrap().body[..], b"up 1");
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(!coordinator.is_mailbox_empty("node1"));

        let err = stuck.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), "enqueue_timeout");
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_scrape_waits_for_first_to_be_claimed() {
        let coordinator = Arc::new(Coordinator::new());
        let spawn_scrape = |query: &'static str| {
            let c = Arc::clone(&coordinator);
            tokio::spawn(async move {
                let url = format!("http://node1:9100/metrics?{query}");
                c.do_scrape(scrape(&url), after(Duration::from_secs(10))).await
            })
        };

        let first = spawn_scrape("first");
        tokio::task::yield_now().await;
        let second = spawn_scrape("second");
        tokio::task::yield_now().await;
        assert_eq!(coordinator.parked_tickets(), 1);
        assert_eq!(coordinator.pending_waiters(), 2);

        let mut answered = Vec::new();
        for _ in 0..2 {
            let instruction = coordinator
                .wait_for_instruction("node1", after(Duration::from_secs(1)))
                .await
                .unwrap();
            let query = instruction.url.query().unwrap_or_default().to_string();
            let id = instruction.correlation_id().unwrap();
            coordinator
                .submit_result(ScrapeResponse::new(200, query.clone()).with_correlation_id(id))
                .unwrap();
            answered.push(query);
        }

        assert_eq!(answered, vec!["first", "second"]);
        assert_eq!(&first.await.unwrap().unwrap().body[..], b"first");
        assert_eq!(&second.await.unwrap().unwrap().body[..], b"second");
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_scrape_leaves_nothing_behind() {
        let coordinator = Arc::new(Coordinator::new());

        // The caller gives up long before the scrape's own deadline.
        let abandoned = tokio::time::timeout(
            Duration::from_secs(1),
            coordinator.do_scrape(scrape("http://node1:9100/metrics"), after(Duration::from_secs(30))),
        )
        .await;
        assert!(abandoned.is_err());

        let stats = coordinator.stats();
        assert_eq!(stats.pending_waiters, 0);
        assert_eq!(stats.parked_tickets, 0);
        assert_eq!(stats.cancelled, 1);

        // The next poll must not see the withdrawn ticket.
        let err = coordinator
            .wait_for_instruction("node1", after(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "no_pending_scrape");
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_push_does_not_leak_into_next_scrape() {
        let coordinator = Arc::new(Coordinator::new());

        let late = {
            let c = Arc::clone(&coordinator);
            tokio::spawn(async move {
                c.do_scrape(scrape("http://node1:9100/metrics?n=1"), after(Duration::from_secs(2)))
                    .await
            })
        };
        let stale = coordinator
            .wait_for_instruction("node1", after(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(late.await.unwrap().unwrap_err().kind(), "result_timeout");

        let next = {
            let c = Arc::clone(&coordinator);
            tokio::spawn(async move {
                c.do_scrape(scrape("http://node1:9100/metrics?n=2"), after(Duration::from_secs(5)))
                    .await
            })
        };
        let fresh = coordinator
            .wait_for_instruction("node1", after(Duration::from_secs(1)))
            .await
            .unwrap();

        let stale_id = stale.correlation_id().unwrap();
        let err = coordinator
            .submit_result(ScrapeResponse::new(200, "stale").with_correlation_id(stale_id))
            .unwrap_err();
        assert_eq!(err.kind(), "unknown_or_expired");

        let fresh_id = fresh.correlation_id().unwrap();
        coordinator
            .submit_result(ScrapeResponse::new(200, "fresh").with_correlation_id(fresh_id))
            .unwrap();
        assert_eq!(&next.await.unwrap().unwrap().body[..], b"fresh");
        assert_eq!(coordinator.stats().unknown_results, 1);
    }
}
