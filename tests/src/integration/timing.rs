//! Deadlines, resets and close under a paused tokio clock.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use futures::future::join_all;
    use nw_02_timeout_scheduler::TimeoutScheduler;
    use nw_03_correlation::testing::TaggedCodec;
    use nw_03_correlation::{Connection, LoopbackBuilder, LoopbackReply, Requester};
    use nw_04_timeout_decorator::with_timeout;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use shared_types::RequestError;
    use tokio::sync::mpsc;
    use tokio::time::{sleep, Instant};

    const DEADLINE: Duration = Duration::from_millis(200);

    async fn connect(network: &LoopbackBuilder) -> Connection<TaggedCodec> {
        Connection::builder("timing", TaggedCodec::default())
            .target("198.51.100.1:7000".parse().unwrap())
            .precision(Duration::from_millis(10))
            .connect(network)
            .await
            .unwrap()
    }

    // =========================================================================
    // Lossy network
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_lossy_network_resolves_every_request_once() {
        // Per-request fate: None drops, Some(delay) answers after delay
        let mut rng = StdRng::seed_from_u64(0x5EED);
        let fates: HashMap<String, Option<u64>> = (0..100)
            .map(|i| {
                let fate = if rng.gen_bool(0.3) {
                    None
                } else {
                    Some(rng.gen_range(0..150))
                };
                (format!("req-{}", i), fate)
            })
            .collect();
        let plan = fates.clone();
        let network = LoopbackBuilder::new(move |_, payload| {
            let body = String::from_utf8_lossy(&payload[4..]).to_string();
            match plan.get(&body).copied().flatten() {
                Some(delay) => LoopbackReply::Delayed(
                    bytes::Bytes::copy_from_slice(payload),
                    Duration::from_millis(delay),
                ),
                None => LoopbackReply::Silent,
            }
        });
        let requester = with_timeout(DEADLINE, connect(&network).await);

        let started = Instant::now();
        let requests = (0..100).map(|i| requester.request(format!("req-{}", i)));
        let results = join_all(requests).await;

        for (i, result) in results.into_iter().enumerate() {
            let body = format!("req-{}", i);
            match fates[&body] {
                Some(_) => assert_eq!(result, Ok(body)),
                None => assert_eq!(result, Err(RequestError::Timeout(DEADLINE))),
            }
        }
        // Every timeout fires within one precision window of its deadline
        assert!(started.elapsed() <= DEADLINE + Duration::from_millis(20));

        let stats = requester.inner().stats().await.unwrap();
        assert_eq!(stats.registered, 100);
        assert_eq!(stats.completed, 100);
        assert_eq!(requester.inner().pending_count().await, 0);
    }

    // =========================================================================
    // Scheduler
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_reset_pushes_deadline_from_reset_time() {
        let scheduler = TimeoutScheduler::named("reset", Duration::from_millis(10));
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);

        let timeout = scheduler.set(Duration::from_millis(100));
        timeout.run(move || flag.store(true, Ordering::SeqCst));

        sleep(Duration::from_millis(80)).await;
        timeout.reset();
        sleep(Duration::from_millis(80)).await;
        assert!(!fired.load(Ordering::SeqCst));
        assert!(timeout.is_armed());

        sleep(Duration::from_millis(40)).await;
        assert!(fired.load(Ordering::SeqCst));
        assert!(timeout.has_fired());
        assert!(!timeout.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn test_many_deadlines_share_one_scheduler() {
        let scheduler = TimeoutScheduler::named("many", Duration::from_millis(5));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let managers: Vec<_> = (1..=50u64)
            .map(|i| {
                let timeout = scheduler.set(Duration::from_millis(i * 10));
                let tx = tx.clone();
                timeout.run(move || {
                    let _ = tx.send(i);
                });
                timeout
            })
            .collect();
        drop(tx);
        for timeout in managers.iter().filter(|timeout| timeout.duration().as_millis() % 20 == 0) {
            assert!(timeout.cancel());
        }

        let mut fired = Vec::new();
        while let Some(i) = rx.recv().await {
            fired.push(i);
        }

        let expected: Vec<u64> = (1..=50).filter(|i| i % 2 == 1).collect();
        assert_eq!(fired, expected);
        assert_eq!(scheduler.active_tasks().await, 0);
    }

    // =========================================================================
    // Close
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_no_callback_after_close() {
        let network = LoopbackBuilder::silent();
        let requester = with_timeout(DEADLINE, connect(&network).await);
        let (tx, mut rx) = mpsc::unbounded_channel();

        for i in 0..10 {
            let tx = tx.clone();
            requester.issue(
                format!("held-{}", i),
                Box::new(move |result| {
                    let _ = tx.send(result);
                }),
            );
        }
        drop(tx);
        sleep(Duration::from_millis(50)).await;
        requester.close();

        let mut outcomes = Vec::new();
        while let Some(outcome) = rx.recv().await {
            outcomes.push(outcome);
        }
        assert_eq!(outcomes.len(), 10);
        assert!(outcomes.iter().all(|outcome| *outcome == Err(RequestError::Closed)));

        // Deadlines that would have fired are gone with the scheduler
        sleep(DEADLINE * 2).await;
        assert!(requester.timeouts().is_closed());
        assert_eq!(network.stats().sent(), 10);
    }
}
