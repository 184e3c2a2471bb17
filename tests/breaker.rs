use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use castgate::breaker::{BreakerCallError, CircuitBreaker, CircuitState};
use tokio::time::sleep;

fn breaker(threshold: u32, recovery: Duration) -> CircuitBreaker {
    CircuitBreaker::builder()
        .failure_threshold(threshold)
        .recovery_timeout(recovery)
        .name("integration")
        .build()
}

#[tokio::test]
async fn consecutive_failures_open_and_fast_fail() {
    let cb = breaker(5, Duration::from_secs(60));
    let invocations = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        let n = Arc::clone(&invocations);
        let result = cb
            .call(async move {
                n.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("boom")
            })
            .await;
        assert!(result.is_err());
    }
    assert_eq!(cb.state(), CircuitState::Open);
    assert_eq!(invocations.load(Ordering::SeqCst), 5);

    // Fast-fail: no further invocations while open.
    for _ in 0..3 {
        let n = Arc::clone(&invocations);
        let result = cb
            .call(async move {
                n.fetch_add(1, Ordering::SeqCst);
                Ok::<(), &str>(())
            })
            .await;
        assert!(matches!(result, Err(BreakerCallError::Rejected(_))));
    }
    assert_eq!(invocations.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn recovery_admits_one_probe_then_closes_on_success() {
    let cb = breaker(1, Duration::from_millis(50));
    cb.record_failure();
    assert_eq!(cb.state(), CircuitState::Open);
    assert!(cb.try_acquire().is_err());

    sleep(Duration::from_millis(70)).await;

    // Exactly one probe.
    assert!(cb.try_acquire().is_ok());
    assert_eq!(cb.state(), CircuitState::HalfOpen);
    assert!(cb.try_acquire().is_err());

    cb.record_success();
    assert_eq!(cb.state(), CircuitState::Closed);
    assert_eq!(cb.status().failure_count, 0);
    assert!(cb.try_acquire().is_ok());
}

#[tokio::test]
async fn probe_failure_reopens() {
    let cb = breaker(2, Duration::from_millis(50));
    cb.record_failure();
    cb.record_failure();
    assert_eq!(cb.state(), CircuitState::Open);

    sleep(Duration::from_millis(70)).await;
    assert!(cb.try_acquire().is_ok());
    cb.record_failure();

    assert_eq!(cb.state(), CircuitState::Open);
    // The pre-open tally is preserved, not reset, before reopening.
    assert_eq!(cb.status().failure_count, 3);
    assert!(cb.try_acquire().is_err());
}

#[tokio::test]
async fn concurrent_half_open_callers_get_one_probe() {
    let cb = Arc::new(breaker(1, Duration::from_millis(30)));
    cb.record_failure();
    sleep(Duration::from_millis(50)).await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let cb = Arc::clone(&cb);
        handles.push(tokio::spawn(async move { cb.try_acquire().is_ok() }));
    }
    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 1);
}

#[tokio::test]
async fn status_snapshot_shape() {
    let cb = breaker(5, Duration::from_secs(60));
    let status = cb.status();
    assert_eq!(status.state, CircuitState::Closed);
    assert_eq!(status.failure_count, 0);
    assert!(status.last_failure_age.is_none());
    assert!(status.retry_in.is_none());

    cb.force_state(CircuitState::Open, 5);
    let status = cb.status();
    assert_eq!(status.state, CircuitState::Open);
    assert_eq!(status.failure_count, 5);
    let retry_in = status.retry_in.expect("open circuit reports retry window");
    assert!(retry_in <= Duration::from_secs(60));

    // Snapshots serialize for the health endpoint.
    let body = serde_json::to_value(&status).unwrap();
    assert_eq!(body["state"], "open");
    assert_eq!(body["failure_count"], 5);
}
