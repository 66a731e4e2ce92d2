// src/resilience/circuit_breaker.rs

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{ResilienceError, Result};

/// Observer invoked on every state transition with the new state
pub type StateObserver = Arc<dyn Fn(CircuitState) + Send + Sync>;

/// The state of the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally
    Closed,
    /// Circuit is open, requests fail fast without reaching the service
    Open,
    /// Circuit is partially open, allowing a probe request to test recovery
    HalfOpen,
}

/// Configuration for circuit breaker
#[derive(Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: usize,
    /// Duration to keep the circuit open before probing for recovery
    pub recovery_timeout: Duration,
    /// Optional observer for state transitions
    pub on_state_change: Option<StateObserver>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            on_state_change: None,
        }
    }
}

impl fmt::Debug for CircuitBreakerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerConfig")
            .field("failure_threshold", &self.failure_threshold)
            .field("recovery_timeout", &self.recovery_timeout)
            .field(
                "on_state_change",
                &self.on_state_change.as_ref().map(|_| "..."),
            )
            .finish()
    }
}

/// Circuit breaker implementation
///
/// One instance protects one external service. The breaker is purely
/// reactive: recovery eligibility is re-checked on every call, never on a
/// background timer.
pub struct CircuitBreaker {
    /// Name of the protected service, used in logs and errors
    name: String,
    /// Current state of the circuit breaker
    state: RwLock<CircuitState>,
    /// Count of consecutive failures
    failure_count: AtomicUsize,
    /// Timestamp of the most recent failure
    last_failure_at: RwLock<Option<Instant>>,
    /// Configuration for the circuit breaker
    config: CircuitBreakerConfig,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("failure_count", &self.failure_count.load(Ordering::SeqCst))
            .field("config", &self.config)
            .finish()
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker for the named service
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicUsize::new(0),
            last_failure_at: RwLock::new(None),
            config,
        }
    }

    /// Name of the protected service
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute an operation through the breaker.
    ///
    /// This is the sole entry point. When the circuit is open and the
    /// recovery timeout has not elapsed, the operation is never invoked and
    /// [`ResilienceError::CircuitOpen`] is returned instead, preserving
    /// backpressure on the failing service.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.allow_request().await {
            debug!(
                service = %self.name,
                "Circuit is open, rejecting call without invoking operation"
            );
            return Err(ResilienceError::CircuitOpen {
                service: self.name.clone(),
            });
        }

        match operation().await {
            Ok(value) => {
                self.record_success().await;
                Ok(value)
            }
            Err(err) => {
                self.record_failure().await;
                Err(err)
            }
        }
    }

    /// Check if the breaker allows a request, transitioning Open -> HalfOpen
    /// when the recovery timeout has elapsed
    async fn allow_request(&self) -> bool {
        // Get a copy of the current state to avoid holding the lock
        let current_state = *self.state.read().await;

        match current_state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let last_failure = *self.last_failure_at.read().await;

                if let Some(at) = last_failure {
                    if at.elapsed() >= self.config.recovery_timeout {
                        self.transition(CircuitState::HalfOpen).await;
                        debug!(service = %self.name, "Circuit breaker probing for recovery");
                        return true;
                    }
                }
                false
            }
            // The next call through a half-open circuit is the probe
            CircuitState::HalfOpen => true,
        }
    }

    /// Record a successful operation
    async fn record_success(&self) {
        let current_state = *self.state.read().await;

        match current_state {
            CircuitState::Closed => {
                // Reset failure count on success
                self.failure_count.store(0, Ordering::SeqCst);
            }
            CircuitState::HalfOpen => {
                // A single successful probe closes the circuit
                self.failure_count.store(0, Ordering::SeqCst);
                self.transition(CircuitState::Closed).await;
                debug!(service = %self.name, "Circuit breaker closed after successful probe");
            }
            CircuitState::Open => {
                debug!(service = %self.name, "Received success in Open state - this is unexpected");
            }
        }
    }

    /// Record a failed operation
    async fn record_failure(&self) {
        {
            let mut last_failure = self.last_failure_at.write().await;
            *last_failure = Some(Instant::now());
        }

        let current_state = *self.state.read().await;

        match current_state {
            CircuitState::Closed => {
                let new_failure_count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;

                if new_failure_count >= self.config.failure_threshold {
                    self.transition(CircuitState::Open).await;
                    warn!(
                        service = %self.name,
                        failures = new_failure_count,
                        "Circuit breaker opened after consecutive failures"
                    );
                }
            }
            CircuitState::HalfOpen => {
                // Any failure in half-open state opens the circuit again
                self.transition(CircuitState::Open).await;
                warn!(service = %self.name, "Circuit breaker re-opened after failed probe");
            }
            CircuitState::Open => {
                // Already open, nothing to do
            }
        }
    }

    /// Manual escape hatch: force the breaker back to Closed from any state
    pub async fn reset(&self) {
        self.failure_count.store(0, Ordering::SeqCst);
        {
            let mut last_failure = self.last_failure_at.write().await;
            *last_failure = None;
        }

        let current_state = *self.state.read().await;
        if current_state != CircuitState::Closed {
            self.transition(CircuitState::Closed).await;
        }
        debug!(service = %self.name, "Circuit breaker manually reset");
    }

    /// Get the current state of the circuit breaker
    pub async fn state(&self) -> CircuitState {
        *self.state.read().await
    }

    /// Current count of consecutive failures
    pub fn failure_count(&self) -> usize {
        self.failure_count.load(Ordering::SeqCst)
    }

    async fn transition(&self, to: CircuitState) {
        {
            let mut state = self.state.write().await;
            *state = to;
        }

        if let Some(observer) = &self.config.on_state_change {
            observer(to);
        }
    }
}
