//! Timeout racer integration tests.

use std::time::Duration;

use bulwark::{Error, ErrorKind, TimeoutConfig, testing::ScriptedOperation, with_timeout};
use tokio::time::Instant;

use crate::common::GatewayError;

/// Fast path: the operation's value comes back unchanged.
#[tokio::test(start_paused = true)]
async fn test_fast_operation_wins() {
    let op = ScriptedOperation::succeeding("session_123").with_latency(Duration::from_millis(20));

    let session = with_timeout(op.call(), Duration::from_millis(100)).await.unwrap();

    assert_eq!(session, "session_123");
}

/// Slow path: the deadline wins with the supplied message, at about the deadline.
#[tokio::test(start_paused = true)]
async fn test_slow_operation_times_out() {
    let op = ScriptedOperation::succeeding(()).with_latency(Duration::from_millis(200));
    let start = Instant::now();

    let err = with_timeout(op.call(), TimeoutConfig::new(Duration::from_millis(50)).with_message("Timeout!"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(err.message(), "Timeout!");
    assert_eq!(start.elapsed(), Duration::from_millis(50));
}

/// An operation failing before the deadline keeps its own error.
#[tokio::test(start_paused = true)]
async fn test_operation_error_is_not_replaced() {
    let op = ScriptedOperation::<()>::failing(ErrorKind::Verification, "document unreadable")
        .with_latency(Duration::from_millis(10));

    let err = with_timeout(op.call(), Duration::from_millis(100)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Verification);
    assert_eq!(err.message(), "document unreadable");
}

/// The synthetic error converts into a caller-defined error type.
#[tokio::test(start_paused = true)]
async fn test_custom_error_type() {
    let charge = async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok::<_, GatewayError>("ch_1")
    };

    let err = with_timeout(
        charge,
        TimeoutConfig::new(Duration::from_secs(20)).with_message("payment provider did not answer"),
    )
    .await
    .unwrap_err();

    assert_eq!(err, GatewayError::TimedOut("payment provider did not answer".to_string()));
}

/// The default message names the deadline.
#[tokio::test(start_paused = true)]
async fn test_default_message_mentions_duration() {
    let err: Error = with_timeout(std::future::pending::<Result<(), Error>>(), Duration::from_secs(2))
        .await
        .unwrap_err();

    assert!(err.message().contains("2s"), "message: {}", err.message());
    assert!(err.is_retriable());
}
