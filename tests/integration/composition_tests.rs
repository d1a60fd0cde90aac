//! Tests for the primitives used together.

use std::{sync::Arc, time::Duration};

use bulwark::{
    BreakerRegistry, CircuitBreaker, CircuitBreakerConfig, CircuitState, Error, ErrorKind,
    ResilienceConfig, ResiliencePolicy, RetryPolicy,
    monitoring::{Metrics, instrument},
    retry_with_backoff,
    testing::ScriptedOperation,
    with_timeout,
};
use tokio::time::Instant;

use crate::common::GatewayError;

/// Hand-nested: breaker around retry around timeout.
#[tokio::test(start_paused = true)]
async fn test_manual_nesting() {
    let breaker = CircuitBreaker::with_defaults("contract-rpc");
    let retry = RetryPolicy::new().with_base_delay(Duration::from_millis(50)).with_jitter(0.0);
    let op = ScriptedOperation::new()
        .fail(ErrorKind::Connection, "network error")
        .succeed(1_234u64)
        .with_latency(Duration::from_millis(10));

    let block = breaker
        .execute(|| {
            retry_with_backoff(|| with_timeout(op.call(), Duration::from_millis(100)), &retry)
        })
        .await
        .unwrap();

    assert_eq!(block, 1_234);
    assert_eq!(op.calls(), 2);
    assert_eq!(breaker.stats().failure_count, 0);
}

/// A hanging dependency: every attempt times out, the retrier gives up and
/// the breaker counts one failure per logical call until it opens.
#[tokio::test(start_paused = true)]
async fn test_hanging_dependency_opens_breaker() {
    let breaker = Arc::new(CircuitBreaker::new(
        "payments",
        CircuitBreakerConfig::builder().failure_threshold(2).build(),
    ));
    let policy = ResiliencePolicy::new("payments")
        .with_breaker(Arc::clone(&breaker))
        .with_retry(
            RetryPolicy::new()
                .with_max_attempts(2)
                .with_base_delay(Duration::from_millis(10))
                .with_jitter(0.0),
        )
        .with_timeout(Duration::from_millis(100));

    let hang = ScriptedOperation::succeeding(()).with_latency(Duration::from_secs(60));

    for _ in 0..2 {
        let err = policy.execute(|| hang.call()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }
    assert_eq!(hang.calls(), 4);
    assert_eq!(breaker.state(), CircuitState::Open);

    let start = Instant::now();
    let err = policy.execute(|| hang.call()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CircuitOpen);
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(hang.calls(), 4);
}

/// A caller-defined error type flows through every layer.
#[tokio::test(start_paused = true)]
async fn test_policy_with_custom_error() {
    let policy = ResiliencePolicy::new("card-processor")
        .with_retry(RetryPolicy::new().with_base_delay(Duration::from_millis(1)).retry_on("network"))
        .with_timeout(Duration::from_millis(500));

    let err = policy
        .execute(|| async { Err::<(), _>(GatewayError::Declined("do not honor".into())) })
        .await
        .unwrap_err();
    assert_eq!(err, GatewayError::Declined("do not honor".into()));

    let err = policy
        .execute(|| async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<_, GatewayError>(())
        })
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::TimedOut(_)));
}

/// Policies built from one config document share breakers through the registry.
#[tokio::test(start_paused = true)]
async fn test_policies_from_config() -> anyhow::Result<()> {
    let config = ResilienceConfig::from_json_str(
        r#"{
            "retry": { "max_attempts": 1 },
            "circuit_breaker": { "failure_threshold": 2, "reset_timeout_ms": 1000 },
            "timeout_ms": 200,
            "dependencies": {
                "kyc": { "circuit_breaker": { "failure_threshold": 1 } }
            }
        }"#,
    )?;
    let registry = BreakerRegistry::from_config(&config)?;
    let metrics = Metrics::default();

    let upload = ResiliencePolicy::from_config(&config, &registry, "kyc")?.with_metrics(metrics.clone());
    let status = ResiliencePolicy::from_config(&config, &registry, "kyc")?.with_metrics(metrics.clone());

    let _ = upload
        .execute(|| async { Err::<(), _>(Error::unavailable("verification service down")) })
        .await;

    let err = status.execute(|| async { Ok::<_, Error>("approved") }).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CircuitOpen);
    assert_eq!(err.user_message(), "Service temporarily unavailable, please try again later.");

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.calls_total, 2);
    assert_eq!(snapshot.calls_failed, 2);
    assert_eq!(snapshot.circuit_rejections, 1);
    assert_eq!(registry.stats()[0].state, CircuitState::Open);
    Ok(())
}

/// Instrumented operations plug straight into a policy.
#[tokio::test(start_paused = true)]
async fn test_instrumented_operation_inside_policy() {
    let metrics = Metrics::default();
    let op = ScriptedOperation::new()
        .fail_times(2, ErrorKind::RateLimited, "429")
        .succeed("quote")
        .with_latency(Duration::from_millis(5));

    let policy = ResiliencePolicy::new("price-feed")
        .with_retry(RetryPolicy::new().with_base_delay(Duration::from_millis(1)))
        .with_metrics(metrics.clone());

    let quote = policy.execute(instrument(&metrics, "price-feed.fetch", || op.call())).await.unwrap();
    assert_eq!(quote, "quote");

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.operations["price-feed.fetch"].calls, 3);
    assert_eq!(snapshot.operations["price-feed.fetch"].failures, 2);
    assert_eq!(snapshot.operations["price-feed"].calls, 1);
    assert_eq!(snapshot.operations["price-feed"].retries, 2);
}
