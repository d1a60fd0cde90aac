//! Circuit breaker integration tests.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use bulwark::{
    CircuitBreaker, CircuitBreakerConfig, CircuitEvent, CircuitState, Error, ErrorKind,
    testing::ScriptedOperation,
};

use crate::common::{CapturedLogs, GatewayError};

fn breaker(threshold: u32, reset: Duration) -> CircuitBreaker {
    CircuitBreaker::new(
        "payment-gateway",
        CircuitBreakerConfig::builder()
            .failure_threshold(threshold)
            .reset_timeout(reset)
            .successes_to_close(1)
            .build(),
    )
}

/// Threshold 3: three failures open the circuit; the fourth call is
/// rejected without reaching the operation.
#[tokio::test(start_paused = true)]
async fn test_trips_after_threshold() {
    let cb = breaker(3, Duration::from_secs(60));
    let op = ScriptedOperation::<()>::failing(ErrorKind::Connection, "ECONNREFUSED");

    for _ in 0..3 {
        let err = cb.execute(|| op.call()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
    }
    assert_eq!(cb.state(), CircuitState::Open);

    let err = cb.execute(|| op.call()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CircuitOpen);
    assert_eq!(err.message(), "Circuit breaker is OPEN");
    assert_eq!(op.calls(), 3);
}

/// After the reset timeout the next call is a half-open trial.
#[tokio::test(start_paused = true)]
async fn test_half_open_trial_after_reset_timeout() {
    let cb = CircuitBreaker::new(
        "kyc",
        CircuitBreakerConfig::builder()
            .failure_threshold(1)
            .reset_timeout(Duration::from_millis(100))
            .successes_to_close(2)
            .build(),
    );
    let _ = cb.execute(|| async { Err::<(), _>(Error::unavailable("provider down")) }).await;
    assert_eq!(cb.state(), CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(150)).await;
    cb.execute(|| async { Ok::<_, Error>(()) }).await.unwrap();
    assert_eq!(cb.state(), CircuitState::HalfOpen);

    cb.execute(|| async { Ok::<_, Error>(()) }).await.unwrap();
    assert_eq!(cb.state(), CircuitState::Closed);
}

/// A failure while half-open reopens the circuit immediately.
#[tokio::test(start_paused = true)]
async fn test_half_open_failure_reopens() {
    let cb = breaker(2, Duration::from_millis(100));
    let op = ScriptedOperation::<()>::failing(ErrorKind::Contract, "nonce too low");

    let _ = cb.execute(|| op.call()).await;
    let _ = cb.execute(|| op.call()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let err = cb.execute(|| op.call()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Contract);
    assert_eq!(cb.state(), CircuitState::Open);
    assert_eq!(op.calls(), 3);
}

/// Downstream errors pass through the breaker untouched, whatever their type.
#[tokio::test(start_paused = true)]
async fn test_custom_error_passthrough_and_rejection() {
    let cb = breaker(1, Duration::from_secs(10));

    let err = cb
        .execute(|| async { Err::<(), _>(GatewayError::Declined("insufficient funds".into())) })
        .await
        .unwrap_err();
    assert_eq!(err, GatewayError::Declined("insufficient funds".into()));

    let err = cb.execute(|| async { Ok::<_, GatewayError>(()) }).await.unwrap_err();
    assert_eq!(err, GatewayError::Unavailable);
}

/// Concurrent callers on a multi-threaded runtime never invoke the operation
/// while the circuit is open.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_respect_open_state() {
    let cb = Arc::new(breaker(5, Duration::from_secs(60)));
    let invoked = Arc::new(AtomicU32::new(0));

    let mut handles = Vec::new();
    for _ in 0..50 {
        let cb = Arc::clone(&cb);
        let invoked = Arc::clone(&invoked);
        handles.push(tokio::spawn(async move {
            cb.execute(|| async move {
                invoked.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Error::connection("refused"))
            })
            .await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_err());
    }

    assert_eq!(cb.state(), CircuitState::Open);
    let stats = cb.stats();
    assert_eq!(u64::from(invoked.load(Ordering::SeqCst)), stats.total_calls);
    assert_eq!(stats.total_calls + stats.rejected_calls, 50);
    assert!(stats.total_calls >= 5);
}

/// Listeners observe every transition with the breaker's name.
#[tokio::test(start_paused = true)]
async fn test_event_listener() {
    let cb = breaker(1, Duration::from_millis(50));
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    cb.on_event(move |name, event| sink.lock().unwrap().push((name.to_string(), event.clone())));

    let _ = cb.execute(|| async { Err::<(), _>(Error::timeout("rpc")) }).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    cb.execute(|| async { Ok::<_, Error>(()) }).await.unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|(name, _)| name == "payment-gateway"));
    assert!(matches!(&events[0].1, CircuitEvent::Opened { failure_count: 1, last_error } if last_error.contains("rpc")));
    assert_eq!(events[1].1, CircuitEvent::HalfOpened);
    assert_eq!(events[2].1, CircuitEvent::Closed { success_count: 1 });
}

/// Transitions are logged with the breaker name.
#[tokio::test(start_paused = true)]
async fn test_transitions_are_logged() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();

    let cb = breaker(1, Duration::from_secs(1));
    let _ = cb.execute(|| async { Err::<(), _>(Error::connection("refused")) }).await;

    let output = logs.contents();
    assert!(output.contains("circuit breaker opened"), "logs: {output}");
    assert!(output.contains("payment-gateway"), "logs: {output}");
}

/// Stats serialize for health endpoints.
#[tokio::test(start_paused = true)]
async fn test_stats_serialize() -> anyhow::Result<()> {
    let cb = breaker(1, Duration::from_secs(1));
    cb.trip();

    let json = serde_json::to_value(cb.stats())?;
    assert_eq!(json["name"], "payment-gateway");
    assert_eq!(json["state"], "open");
    assert!(json["last_opened_at"].is_string());
    Ok(())
}
