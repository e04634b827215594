//! End-to-end workflows through the composed provider call stack
//!
//! These tests drive `ProviderApi` the way an integration module would:
//! retry wrapping breaker checks, timeout-guarded calls, and
//! classification, against fake providers with scripted behavior.

use finguard_core::{
    Backoff, CircuitBreakerConfig, CircuitBreakerRegistry, ErrorKind, ProviderApi, ProviderId,
    RawError, Region, RetryConfig,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn registry_with(threshold: u32) -> Arc<CircuitBreakerRegistry> {
    Arc::new(CircuitBreakerRegistry::new(CircuitBreakerConfig {
        failure_threshold: threshold,
        failure_window: Duration::from_secs(60),
        success_threshold: 3,
        base_cooldown: Duration::from_millis(40),
        max_cooldown: Duration::from_millis(320),
    }))
}

fn instant_retries(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        backoff: Backoff::Fixed {
            delay: Duration::ZERO,
        },
        ..RetryConfig::default()
    }
}

fn plaid_api(registry: &Arc<CircuitBreakerRegistry>) -> ProviderApi {
    ProviderApi::new(
        Arc::clone(registry),
        ProviderId::Plaid,
        Region::parse("us").expect("valid region"),
    )
}

#[tokio::test]
async fn flaky_provider_recovers_within_the_retry_budget() {
    // Given: a provider that rate-limits twice and then succeeds
    let registry = registry_with(5);
    let api = plaid_api(&registry);
    let attempts = Arc::new(AtomicU32::new(0));

    // When: the sync runs through the full composed stack
    let counter = Arc::clone(&attempts);
    let result = api
        .call_with_retry("transactions_sync", &instant_retries(3), move || {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(RawError::from_status(
                        429,
                        r#"{"error_type":"RATE_LIMIT_EXCEEDED","error_code":"RATE_LIMIT_EXCEEDED","error_message":"rate limit exceeded"}"#,
                    ))
                } else {
                    Ok(vec!["acct_1", "acct_2"])
                }
            }
        })
        .await;

    // Then: the caller sees the success value after three attempts
    assert_eq!(result.expect("third attempt succeeds").len(), 2);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn revoked_credentials_short_circuit_the_retry_budget() {
    // Given: a provider whose credentials were revoked
    let registry = registry_with(5);
    let api = plaid_api(&registry);
    let attempts = Arc::new(AtomicU32::new(0));

    // When: the sync runs with a generous retry budget
    let counter = Arc::clone(&attempts);
    let result: Result<(), _> = api
        .call_with_retry("transactions_sync", &instant_retries(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async {
                Err(RawError::from_status(
                    400,
                    r#"{"error_type":"ITEM_ERROR","error_code":"ITEM_LOGIN_REQUIRED","error_message":"the login details of this item have changed"}"#,
                ))
            }
        })
        .await;

    // Then: exactly one attempt was made and the caller is told to
    // re-authenticate
    let error = result.expect_err("auth failures are terminal");
    assert_eq!(error.kind(), ErrorKind::AuthFailed);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn six_failures_leave_the_sixth_call_fast_failing() {
    // Given: a breaker tripping at 5 failures per window
    let registry = registry_with(5);
    let api = plaid_api(&registry);
    let reached = Arc::new(AtomicU32::new(0));

    // When: five consecutive calls fail
    for _ in 0..5 {
        let counter = Arc::clone(&reached);
        let result: Result<(), _> = api
            .call("transactions_sync", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(RawError::from_status(503, "<html>down</html>")) }
            })
            .await;
        assert_eq!(result.expect_err("outage").kind(), ErrorKind::Unavailable);
    }
    assert_eq!(reached.load(Ordering::SeqCst), 5);

    // Then: the sixth call (and any later one inside the cooldown) fails
    // fast without reaching the provider
    for _ in 0..3 {
        let counter = Arc::clone(&reached);
        let result: Result<(), _> = api
            .call("transactions_sync", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;
        assert_eq!(
            result.expect_err("circuit is open").kind(),
            ErrorKind::CircuitOpen
        );
    }
    assert_eq!(reached.load(Ordering::SeqCst), 5, "thunk never invoked");
}

#[tokio::test]
async fn breaker_heals_after_cooldown_and_successful_probes() {
    // Given: a tripped circuit for plaid/us
    let registry = registry_with(2);
    let api = plaid_api(&registry);

    for _ in 0..2 {
        let _: Result<(), _> = api
            .call("transactions_sync", || async {
                Err(RawError::from_status(503, "{}"))
            })
            .await;
    }
    let region = Region::parse("us").expect("valid region");
    assert!(registry.is_circuit_open(ProviderId::Plaid, &region));

    // When: the cooldown elapses and probes succeed
    tokio::time::sleep(Duration::from_millis(60)).await;
    for _ in 0..3 {
        api.call("transactions_sync", || async { Ok::<_, RawError>(()) })
            .await
            .expect("probe admitted and succeeds");
    }

    // Then: the circuit is closed again and calls flow normally
    assert!(!registry.is_circuit_open(ProviderId::Plaid, &region));
    api.call("transactions_sync", || async { Ok::<_, RawError>(()) })
        .await
        .expect("healthy circuit admits calls");
}

#[tokio::test]
async fn retry_outlives_a_tripped_breaker_when_cooldown_is_short() {
    // Given: a breaker that trips after 2 failures with a short cooldown
    let registry = registry_with(2);
    let api = plaid_api(&registry);
    let attempts = Arc::new(AtomicU32::new(0));

    // When: the composed call retries through trip and recovery, backing
    // off longer than the cooldown between attempts
    let config = RetryConfig {
        max_retries: 4,
        backoff: Backoff::Fixed {
            delay: Duration::from_millis(60),
        },
        ..RetryConfig::default()
    };

    let counter = Arc::clone(&attempts);
    let result = api
        .call_with_retry("transactions_sync", &config, move || {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(RawError::from_status(503, "{}"))
                } else {
                    Ok("synced")
                }
            }
        })
        .await;

    // Then: the circuit opened after the second failure, the next retry
    // arrived after the cooldown as a half-open probe, and succeeded
    assert_eq!(result.expect("probe succeeds"), "synced");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn regional_isolation_keeps_healthy_regions_serving() {
    // Given: plaid/us melting down while plaid/eu is healthy
    let registry = registry_with(2);
    let us_api = plaid_api(&registry);
    let eu_api = ProviderApi::new(
        Arc::clone(&registry),
        ProviderId::Plaid,
        Region::parse("eu").expect("valid region"),
    );

    for _ in 0..2 {
        let _: Result<(), _> = us_api
            .call("transactions_sync", || async {
                Err(RawError::from_status(503, "{}"))
            })
            .await;
    }

    // When: both regions are called
    let us_result: Result<(), _> = us_api
        .call("transactions_sync", || async { Ok(()) })
        .await;
    let eu_result = eu_api
        .call("transactions_sync", || async { Ok::<_, RawError>("ok") })
        .await;

    // Then: only the us circuit rejects
    assert_eq!(
        us_result.expect_err("us is open").kind(),
        ErrorKind::CircuitOpen
    );
    assert_eq!(eu_result.expect("eu unaffected"), "ok");
}

#[tokio::test]
async fn per_attempt_deadlines_map_to_timeout_errors() {
    // Given: a provider that stalls past the configured deadline
    let registry = registry_with(5);
    let api = plaid_api(&registry).with_call_timeout(Duration::from_millis(15));

    // When: the call runs
    let result: Result<(), _> = api
        .call("transactions_sync", || async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(())
        })
        .await;

    // Then: the caller sees a Timeout-kind error naming the budget
    let error = result.expect_err("deadline wins");
    assert_eq!(error.kind(), ErrorKind::Timeout);
    assert!(error.message().contains("transactions_sync"));
    assert!(error.retryable());
}
