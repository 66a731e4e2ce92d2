// src/lib.rs
//! Resilience toolkit for unreliable backend services.
//!
//! Two halves: composable resilience primitives (retry, circuit breaking,
//! timeouts, fallbacks) wrapped up in a JSON-over-HTTP client, and a
//! realtime WebSocket client with automatic reconnection and heartbeat.

pub mod error;
pub mod logging;
pub mod realtime;
pub mod resilience;

// Re-export key components for convenience
pub use error::{ResilienceError, Result};
pub use logging::init as init_logging;
pub use realtime::{ConnectionState, RealtimeClient, RealtimeMessage, RealtimeOptions};
pub use resilience::{
    with_fallback, with_fallback_and_timeout, with_retry, with_timeout, BackoffStrategy,
    BreakerStatus, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState,
    FallbackCache, FetchConfig, ReportedState, ResilientClient, ResilientClientConfig, RetryPolicy,
};
