mod common;

use azdir_lifecycle::{poll_until, Observation, OperationContext, PollConfig, PollError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use Observation::{Absent, Present};

fn config(consecutive_target: u32) -> PollConfig {
    PollConfig {
        interval_ms: 1_000,
        consecutive_target,
    }
}

/// Probe replaying `sequence`, repeating its last element once exhausted.
fn scripted(
    sequence: Vec<Observation>,
    calls: Arc<AtomicUsize>,
) -> impl FnMut() -> std::future::Ready<Result<Observation, String>> {
    move || {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        let observation = sequence[n.min(sequence.len() - 1)];
        std::future::ready(Ok(observation))
    }
}

#[tokio::test(start_paused = true)]
async fn requires_consecutive_observations() {
    common::init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let ctx = OperationContext::with_timeout(Duration::from_secs(60));

    let result = poll_until(
        &ctx,
        &config(3),
        Present,
        scripted(vec![Absent, Present, Absent, Present, Present, Present], calls.clone()),
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 6);
}

#[tokio::test(start_paused = true)]
async fn waits_at_least_the_interval_between_probes() {
    let calls = Arc::new(AtomicUsize::new(0));
    let ctx = OperationContext::with_timeout(Duration::from_secs(60));
    let started = Instant::now();

    poll_until(&ctx, &config(3), Absent, scripted(vec![Absent], calls.clone()))
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(started.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn deadline_bounds_the_poll() {
    let calls = Arc::new(AtomicUsize::new(0));
    let ctx = OperationContext::with_timeout(Duration::from_secs(2));
    let started = Instant::now();

    let result = poll_until(&ctx, &config(3), Present, scripted(vec![Absent], calls.clone())).await;

    match result {
        Err(PollError::Timeout { attempts, .. }) => assert!(attempts >= 1),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(started.elapsed() <= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn expired_context_does_not_probe() {
    let calls = Arc::new(AtomicUsize::new(0));
    let ctx = OperationContext::with_timeout(Duration::ZERO);

    let result = poll_until(&ctx, &config(1), Present, scripted(vec![Present], calls.clone())).await;

    assert!(matches!(result, Err(PollError::Timeout { attempts: 0, .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn probe_error_is_returned() {
    let ctx = OperationContext::with_timeout(Duration::from_secs(60));

    let result = poll_until(&ctx, &config(3), Present, || async {
        Err::<Observation, _>("replica unavailable".to_string())
    })
    .await;

    match result {
        Err(PollError::Probe(message)) => assert_eq!(message, "replica unavailable"),
        other => panic!("expected probe error, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn slow_probe_is_abandoned_at_deadline() {
    let ctx = OperationContext::with_timeout(Duration::from_secs(2));
    let started = Instant::now();

    let result = poll_until(&ctx, &config(1), Present, || async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok::<_, String>(Present)
    })
    .await;

    assert!(matches!(result, Err(PollError::Timeout { .. })));
    assert!(started.elapsed() <= Duration::from_secs(3));
}
