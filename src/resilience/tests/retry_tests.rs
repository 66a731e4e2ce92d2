// src/resilience/tests/retry_tests.rs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::ResilienceError;
use crate::resilience::{with_retry, BackoffStrategy, RetryPolicy};

fn failing_error() -> ResilienceError {
    ResilienceError::Request("simulated failure".to_string())
}

#[test]
fn test_exponential_delay_doubles_per_attempt() {
    let policy = RetryPolicy {
        base_delay: Duration::from_millis(100),
        backoff: BackoffStrategy::Exponential,
        ..RetryPolicy::default()
    };

    assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
    assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
    assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
    assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(800));
}

#[test]
fn test_linear_delay_grows_with_attempt() {
    let policy = RetryPolicy {
        base_delay: Duration::from_millis(100),
        backoff: BackoffStrategy::Linear,
        ..RetryPolicy::default()
    };

    assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
    assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
    assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(300));
}

#[test]
fn test_large_attempt_numbers_saturate() {
    let policy = RetryPolicy {
        base_delay: Duration::from_millis(1000),
        backoff: BackoffStrategy::Exponential,
        ..RetryPolicy::default()
    };

    // Must not overflow, just clamp to a huge delay
    let delay = policy.delay_for_attempt(200);
    assert!(delay >= Duration::from_millis(1000));
}

#[tokio::test]
async fn test_success_on_first_attempt_invokes_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let policy = RetryPolicy::default();

    let result = with_retry(&policy, || {
        let calls = Arc::clone(&calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ResilienceError>(42)
        }
    })
    .await;

    assert_eq!(result.unwrap(), 42);
    assert_eq!(calls.load(Ordering::SeqCst), 1, "No retry on success");
}

#[tokio::test]
async fn test_always_failing_invokes_exactly_max_attempts() {
    let calls = Arc::new(AtomicUsize::new(0));
    let policy = RetryPolicy {
        max_attempts: 4,
        base_delay: Duration::from_millis(5),
        ..RetryPolicy::default()
    };

    let result: Result<(), _> = with_retry(&policy, || {
        let calls = Arc::clone(&calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(failing_error())
        }
    })
    .await;

    assert_eq!(
        calls.load(Ordering::SeqCst),
        4,
        "Operation invoked exactly max_attempts times"
    );
    assert!(
        matches!(result, Err(ResilienceError::Request(_))),
        "Final rejection is the last attempt's error, not a wrapper"
    );
}

#[tokio::test]
async fn test_single_attempt_policy_never_retries() {
    let calls = Arc::new(AtomicUsize::new(0));
    let policy = RetryPolicy::with_max_attempts(1);

    let result: Result<(), _> = with_retry(&policy, || {
        let calls = Arc::clone(&calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(failing_error())
        }
    })
    .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_recovers_after_transient_failures() {
    let calls = Arc::new(AtomicUsize::new(0));
    let policy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(5),
        ..RetryPolicy::default()
    };

    let result = with_retry(&policy, || {
        let calls = Arc::clone(&calls);
        async move {
            let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt < 3 {
                Err(failing_error())
            } else {
                Ok("recovered")
            }
        }
    })
    .await;

    assert_eq!(result.unwrap(), "recovered");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_observer_sees_each_failed_attempt() {
    let observed = Arc::new(Mutex::new(Vec::new()));
    let policy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(5),
        on_retry: Some(Arc::new({
            let observed = Arc::clone(&observed);
            move |attempt: u32, err: &ResilienceError| {
                observed
                    .lock()
                    .unwrap()
                    .push((attempt, err.to_string()));
            }
        })),
        ..RetryPolicy::default()
    };

    let result: Result<(), _> = with_retry(&policy, || async { Err(failing_error()) }).await;

    assert!(result.is_err());
    let observed = observed.lock().unwrap();
    // The final failure is returned, not observed as a retry
    assert_eq!(observed.len(), 2);
    assert_eq!(observed[0].0, 1);
    assert_eq!(observed[1].0, 2);
    assert!(observed[0].1.contains("simulated failure"));
}
