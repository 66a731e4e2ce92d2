// src/resilience/registry.rs

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

/// Breaker state as reported to observability consumers
///
/// Mirrors [`CircuitState`] with an extra `Unknown` for services that have
/// never been called through the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportedState {
    Closed,
    Open,
    HalfOpen,
    Unknown,
}

impl From<CircuitState> for ReportedState {
    fn from(state: CircuitState) -> Self {
        match state {
            CircuitState::Closed => ReportedState::Closed,
            CircuitState::Open => ReportedState::Open,
            CircuitState::HalfOpen => ReportedState::HalfOpen,
        }
    }
}

/// Read-only snapshot of one breaker for observability
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerStatus {
    pub service_name: String,
    pub state: ReportedState,
    pub failure_count: usize,
}

/// Owned registry mapping service names to their circuit breakers
///
/// One registry per client (or shared between clients via `Arc`), so that
/// failures against one external dependency never trip breakers for
/// unrelated dependencies, and tests can construct a fresh registry instead
/// of resetting shared global state.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    /// Configuration applied to lazily created breakers
    defaults: CircuitBreakerConfig,
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreakerRegistry {
    /// Create a registry whose lazily created breakers use the given defaults
    pub fn new(defaults: CircuitBreakerConfig) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            defaults,
        }
    }

    /// Look up the breaker for a service, creating it on first use
    pub async fn breaker(&self, service_name: &str) -> Arc<CircuitBreaker> {
        {
            let breakers = self.breakers.read().await;
            if let Some(breaker) = breakers.get(service_name) {
                return Arc::clone(breaker);
            }
        }

        let mut breakers = self.breakers.write().await;
        // Re-check under the write lock: another task may have inserted
        if let Some(breaker) = breakers.get(service_name) {
            return Arc::clone(breaker);
        }

        debug!(service = service_name, "Registering new circuit breaker");
        let breaker = Arc::new(CircuitBreaker::new(service_name, self.defaults.clone()));
        breakers.insert(service_name.to_string(), Arc::clone(&breaker));
        breaker
    }

    /// Status snapshot for one service; unregistered names report `Unknown`
    pub async fn status(&self, service_name: &str) -> BreakerStatus {
        let breakers = self.breakers.read().await;
        match breakers.get(service_name) {
            Some(breaker) => BreakerStatus {
                service_name: service_name.to_string(),
                state: breaker.state().await.into(),
                failure_count: breaker.failure_count(),
            },
            None => BreakerStatus {
                service_name: service_name.to_string(),
                state: ReportedState::Unknown,
                failure_count: 0,
            },
        }
    }

    /// Status snapshots for every registered breaker, sorted by service name
    pub async fn all_statuses(&self) -> Vec<BreakerStatus> {
        let breakers = self.breakers.read().await;
        let mut statuses = Vec::with_capacity(breakers.len());

        for (name, breaker) in breakers.iter() {
            statuses.push(BreakerStatus {
                service_name: name.clone(),
                state: breaker.state().await.into(),
                failure_count: breaker.failure_count(),
            });
        }

        statuses.sort_by(|a, b| a.service_name.cmp(&b.service_name));
        statuses
    }
}
