// src/resilience/retry.rs

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::debug;

use crate::error::{ResilienceError, Result};

/// Observer invoked before each re-attempt with the attempt number that just
/// failed and the error it produced
pub type RetryObserver = Arc<dyn Fn(u32, &ResilienceError) + Send + Sync>;

/// How the inter-attempt delay grows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackoffStrategy {
    /// Delay grows proportionally to the attempt number
    Linear,
    /// Delay doubles with each attempt
    #[default]
    Exponential,
}

/// Configuration for retry behavior
///
/// Immutable per call; construct one and share it freely.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first (must be >= 1)
    pub max_attempts: u32,
    /// Base delay between attempts
    pub base_delay: Duration,
    /// Backoff strategy applied to the base delay
    pub backoff: BackoffStrategy,
    /// Optional observer called before each re-attempt
    pub on_retry: Option<RetryObserver>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            backoff: BackoffStrategy::Exponential,
            on_retry: None,
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("backoff", &self.backoff)
            .field("on_retry", &self.on_retry.as_ref().map(|_| "..."))
            .finish()
    }
}

impl RetryPolicy {
    /// Create a policy with the given attempt budget, keeping the other defaults
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Delay to wait after the given attempt number (1-based) has failed
    ///
    /// Linear: `base_delay * attempt`. Exponential: `base_delay * 2^(attempt-1)`.
    /// Arithmetic saturates rather than overflowing for large attempt numbers.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let delay_ms = match self.backoff {
            BackoffStrategy::Linear => base_ms.saturating_mul(u64::from(attempt)),
            BackoffStrategy::Exponential => {
                let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
                base_ms.saturating_mul(factor)
            }
        };
        Duration::from_millis(delay_ms)
    }
}

/// Run an operation, re-attempting on failure according to the policy.
///
/// The operation is invoked at most `max_attempts` times. After the final
/// failure the last error is returned unchanged so callers can still match on
/// it. There is no cancellation here; callers that need to abandon the loop
/// early should race it with [`with_timeout`](crate::resilience::with_timeout).
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_attempts {
                    return Err(err);
                }

                if let Some(observer) = &policy.on_retry {
                    observer(attempt, &err);
                }

                let delay = policy.delay_for_attempt(attempt);
                debug!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Attempt failed, retrying after backoff"
                );

                time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
