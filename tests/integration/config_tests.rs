//! Configuration document tests.

use std::time::Duration;

use bulwark::{ErrorKind, ResilienceConfig};
use test_case::test_case;

const DOCUMENT: &str = r#"{
    "retry": {
        "max_attempts": 4,
        "base_delay_ms": 250,
        "max_delay_ms": 5000,
        "retryable_errors": ["network", "timeout"],
        "retryable_kinds": ["rate_limited"]
    },
    "circuit_breaker": { "failure_threshold": 5, "reset_timeout_ms": 30000 },
    "timeout_ms": 10000,
    "dependencies": {
        "payments": { "timeout_ms": 20000, "retry": { "max_attempts": 2 } },
        "blockchain": { "retry": { "max_attempts": 6, "max_delay_ms": null } },
        "kyc": { "circuit_breaker": { "failure_threshold": 3, "successes_to_close": 1 } }
    }
}"#;

#[test]
fn test_defaults_apply_to_unknown_dependency() -> anyhow::Result<()> {
    let config = ResilienceConfig::from_json_str(DOCUMENT)?;

    let retry = config.retry_policy("email")?;
    assert_eq!(retry.max_attempts, 4);
    assert_eq!(retry.base_delay, Duration::from_millis(250));
    assert_eq!(retry.max_delay, Some(Duration::from_secs(5)));
    assert_eq!(retry.retryable.len(), 3);
    assert_eq!(config.timeout("email").map(|t| t.duration), Some(Duration::from_secs(10)));
    Ok(())
}

#[test_case("payments", 2, Some(20_000) ; "payments override")]
#[test_case("blockchain", 6, Some(10_000) ; "blockchain override")]
#[test_case("kyc", 4, Some(10_000) ; "kyc inherits retry")]
fn test_dependency_overrides(name: &str, attempts: u32, timeout_ms: Option<u64>) {
    let config = ResilienceConfig::from_json_str(DOCUMENT).unwrap();
    assert_eq!(config.retry_policy(name).unwrap().max_attempts, attempts);
    assert_eq!(config.timeout(name).map(|t| t.duration), timeout_ms.map(Duration::from_millis));
}

#[test]
fn test_override_replaces_whole_section() {
    let config = ResilienceConfig::from_json_str(DOCUMENT).unwrap();

    // unspecified fields come from built-in defaults, not the document's default section
    let blockchain = config.retry_policy("blockchain").unwrap();
    assert_eq!(blockchain.max_delay, None);
    assert!(blockchain.retryable.is_empty());

    let kyc = config.breaker_config("kyc").unwrap();
    assert_eq!(kyc.failure_threshold(), 3);
    assert_eq!(kyc.successes_to_close(), 1);
    assert_eq!(kyc.reset_timeout(), Duration::from_secs(30));
}

#[test_case(r#"{ "retry": { "max_attempts": 0 } }"# ; "zero attempts")]
#[test_case(r#"{ "retry": { "jitter": 1.5 } }"# ; "jitter out of range")]
#[test_case(r#"{ "circuit_breaker": { "failure_threshold": 0 } }"# ; "zero threshold")]
#[test_case(r#"{ "dependencies": { "x": { "retry": { "multiplier": 0.5 } } } }"# ; "bad override")]
#[test_case(r#"{ "retries": {} }"# ; "unknown field")]
#[test_case(r#"{ "timeout_ms": "soon" }"# ; "wrong type")]
fn test_invalid_documents(json: &str) {
    let err = ResilienceConfig::from_json_str(json).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_from_slice_round_trip() -> anyhow::Result<()> {
    let config = ResilienceConfig::from_json_slice(DOCUMENT.as_bytes())?;
    let json = serde_json::to_vec(&config)?;
    assert_eq!(ResilienceConfig::from_json_slice(&json)?, config);
    Ok(())
}
