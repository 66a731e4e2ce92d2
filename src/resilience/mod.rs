// src/resilience/mod.rs
//! Resilience primitives for calling unreliable external services.
//!
//! This module provides composable building blocks:
//!
//! 1. **Retry with Backoff** - bounded re-attempts with linear or exponential delays
//! 2. **Circuit Breaking** - fail fast while a dependency is presumed down
//! 3. **Timeouts and Fallbacks** - bounded waits and degraded-result substitution
//! 4. **Resilient Client** - all of the above composed around a JSON HTTP call,
//!    keyed per external service
//!
//! The pieces compose innermost to outermost: timeout-bounded attempt, circuit
//! breaker, retry, then optional fallback.

mod circuit_breaker;
mod client;
mod fallback;
mod registry;
mod retry;

#[cfg(test)]
mod tests;

// Re-export key components
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState, StateObserver};
pub use client::{FetchConfig, ResilientClient, ResilientClientConfig};
pub use fallback::{with_fallback, with_fallback_and_timeout, with_timeout, FallbackCache};
pub use registry::{BreakerStatus, CircuitBreakerRegistry, ReportedState};
pub use retry::{with_retry, BackoffStrategy, RetryObserver, RetryPolicy};
