//! Backoff retrier integration tests.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use bulwark::{Error, ErrorKind, RetryPolicy, retry_with_backoff, testing::ScriptedOperation};
use tokio::time::Instant;

use crate::common::{GatewayError, init_tracing};

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new()
        .with_max_attempts(max_attempts)
        .with_base_delay(Duration::from_millis(10))
        .with_jitter(0.0)
}

/// An operation that always succeeds is invoked exactly once.
#[tokio::test(start_paused = true)]
async fn test_success_is_not_retried() {
    init_tracing();
    let op = ScriptedOperation::succeeding(7u32);

    let value = retry_with_backoff(|| op.call(), &policy(3)).await.unwrap();

    assert_eq!(value, 7);
    assert_eq!(op.calls(), 1);
}

/// An operation failing N-1 times then succeeding is invoked exactly N times.
#[tokio::test(start_paused = true)]
async fn test_succeeds_on_last_allowed_attempt() {
    for max_attempts in [1, 3, 6] {
        let op = ScriptedOperation::new()
            .fail_times(max_attempts - 1, ErrorKind::Connection, "network unreachable")
            .succeed("0xdeadbeef");

        let tx = retry_with_backoff(|| op.call(), &policy(max_attempts)).await.unwrap();

        assert_eq!(tx, "0xdeadbeef");
        assert_eq!(op.calls(), max_attempts, "max_attempts = {max_attempts}");
    }
}

/// Exhaustion surfaces the last attempt's error.
#[tokio::test(start_paused = true)]
async fn test_exhaustion_surfaces_last_error() {
    let attempt = AtomicU32::new(0);
    let result: Result<(), GatewayError> = retry_with_backoff(
        || async {
            let n = attempt.fetch_add(1, Ordering::SeqCst) + 1;
            Err(GatewayError::Network(format!("attempt {n}")))
        },
        &policy(3),
    )
    .await;

    assert_eq!(result.unwrap_err(), GatewayError::Network("attempt 3".to_string()));
    assert_eq!(attempt.load(Ordering::SeqCst), 3);
}

/// A non-matching error stops after one call.
#[tokio::test(start_paused = true)]
async fn test_non_retryable_error_is_not_retried() {
    let op = ScriptedOperation::<()>::failing(ErrorKind::Validation, "validation error");
    let policy = policy(3).retry_on("network");

    let err = retry_with_backoff(|| op.call(), &policy).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(op.calls(), 1);
}

/// A plain-string error is matched on its text alone; no category is inferred.
#[tokio::test(start_paused = true)]
async fn test_plain_string_error_without_match_runs_once() {
    let calls = AtomicU32::new(0);
    let policy = policy(3).retry_on("connection");

    let err = retry_with_backoff(
        || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>("fetch failed".to_string())
        },
        &policy,
    )
    .await
    .unwrap_err();

    assert_eq!(err, "fetch failed");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Matching is case-insensitive and considers the category.
#[tokio::test(start_paused = true)]
async fn test_matcher_variants() {
    let cases = [
        ("CONNECTION", ErrorKind::Connection, "socket hang up"),
        ("rate_limited", ErrorKind::RateLimited, "429 from provider"),
        ("econnreset", ErrorKind::Internal, "read ECONNRESET"),
    ];

    for (pattern, kind, message) in cases {
        let op = ScriptedOperation::new().fail(kind, message).succeed(());
        let policy = policy(2).retry_on(pattern);

        retry_with_backoff(|| op.call(), &policy).await.unwrap();
        assert_eq!(op.calls(), 2, "pattern {pattern:?}");
    }
}

/// The retry observer sees each failed attempt before its retry.
#[tokio::test(start_paused = true)]
async fn test_on_retry_observer() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let policy = policy(3).on_retry(move |attempt, err| {
        sink.lock().unwrap().push((attempt, err.to_string()));
    });

    let op = ScriptedOperation::new()
        .fail(ErrorKind::Connection, "err1")
        .fail(ErrorKind::Connection, "err2")
        .succeed(());
    retry_with_backoff(|| op.call(), &policy).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![(1, "connection error: err1".to_string()), (2, "connection error: err2".to_string())]
    );
}

/// Delays follow base * multiplier^(attempt-1) when jitter is off.
#[tokio::test(start_paused = true)]
async fn test_backoff_schedule() {
    let op = ScriptedOperation::<()>::failing(ErrorKind::Unavailable, "node syncing");
    let policy = RetryPolicy::new()
        .with_max_attempts(4)
        .with_base_delay(Duration::from_millis(100))
        .with_multiplier(3.0)
        .with_jitter(0.0);

    let start = Instant::now();
    let _ = retry_with_backoff(|| op.call(), &policy).await;

    // 100 + 300 + 900
    assert_eq!(start.elapsed(), Duration::from_millis(1_300));
    assert_eq!(op.calls(), 4);
}

/// Jittered delays stay within the configured band.
#[tokio::test(start_paused = true)]
async fn test_jittered_delay_bounds() {
    let policy = RetryPolicy::new()
        .with_max_attempts(2)
        .with_base_delay(Duration::from_millis(1_000))
        .with_jitter(0.2);

    for _ in 0..20 {
        let op = ScriptedOperation::<()>::failing(ErrorKind::Timeout, "rpc timeout");
        let start = Instant::now();
        let _ = retry_with_backoff(|| op.call(), &policy).await;
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(800), "waited {waited:?}");
        assert!(waited <= Duration::from_millis(1_200), "waited {waited:?}");
    }
}

/// The crate error type and a plain `anyhow`-style boxed error both work.
#[tokio::test(start_paused = true)]
async fn test_boxed_errors() -> anyhow::Result<()> {
    let calls = AtomicU32::new(0);
    let policy = policy(3).retry_on(ErrorKind::Timeout);

    let value = retry_with_backoff(
        || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                let err: Box<dyn std::error::Error + Send + Sync> =
                    Box::new(Error::timeout("upstream took too long"));
                Err(err)
            } else {
                Ok("settled")
            }
        },
        &policy,
    )
    .await
    .map_err(|e| anyhow::anyhow!(e))?;

    assert_eq!(value, "settled");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    Ok(())
}
