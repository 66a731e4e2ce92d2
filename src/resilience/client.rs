// src/resilience/client.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::error::{ResilienceError, Result};
use crate::resilience::circuit_breaker::CircuitBreakerConfig;
use crate::resilience::fallback::with_fallback_and_timeout;
use crate::resilience::registry::{BreakerStatus, CircuitBreakerRegistry};
use crate::resilience::retry::{with_retry, BackoffStrategy, RetryPolicy};

/// Client-wide defaults for resilient requests
#[derive(Debug, Clone)]
pub struct ResilientClientConfig {
    /// Deadline for each individual attempt; the request is aborted when it fires
    pub request_timeout: Duration,
    /// Outer deadline applied to the whole retry pipeline when a fallback is set
    pub total_timeout: Duration,
    /// Attempt budget per call, including the first attempt
    pub max_retries: u32,
    /// Base delay for exponential backoff between attempts
    pub retry_base_delay: Duration,
    /// Configuration for lazily created per-service circuit breakers
    pub breaker_defaults: CircuitBreakerConfig,
}

impl Default for ResilientClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            total_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            breaker_defaults: CircuitBreakerConfig::default(),
        }
    }
}

/// Per-call configuration
///
/// `service_name` keys the circuit breaker so unrelated dependencies never
/// share failure accounting. The remaining fields override client defaults.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Key of the external service this call depends on
    pub service_name: String,
    /// Per-attempt timeout override
    pub timeout: Option<Duration>,
    /// Attempt budget override
    pub max_retries: Option<u32>,
    /// Static value returned when the whole pipeline fails or the outer
    /// deadline fires
    pub fallback: Option<Value>,
    /// Extra request headers; `Content-Type: application/json` is sent by
    /// default and can be overridden here
    pub headers: HashMap<String, String>,
}

impl FetchConfig {
    /// Configuration for the named service with all defaults
    pub fn for_service(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            timeout: None,
            max_retries: None,
            fallback: None,
            headers: HashMap::new(),
        }
    }

    /// Set a static fallback value
    pub fn with_fallback(mut self, fallback: Value) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Override the per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the attempt budget
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Add a request header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// JSON-over-HTTP client composing timeout, circuit breaking, retry, and
/// fallback around every call
///
/// Composition, innermost to outermost: one abortable HTTP attempt, the named
/// service's circuit breaker, retry with exponential backoff, and (when a
/// fallback value is configured) a fallback bounded by the outer deadline.
#[derive(Debug, Clone)]
pub struct ResilientClient {
    http: reqwest::Client,
    registry: Arc<CircuitBreakerRegistry>,
    config: ResilientClientConfig,
}

impl ResilientClient {
    /// Create a client owning a fresh breaker registry
    pub fn new(config: ResilientClientConfig) -> Result<Self> {
        let registry = Arc::new(CircuitBreakerRegistry::new(config.breaker_defaults.clone()));
        Self::with_registry(config, registry)
    }

    /// Create a client sharing an existing breaker registry
    pub fn with_registry(
        config: ResilientClientConfig,
        registry: Arc<CircuitBreakerRegistry>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|err| ResilienceError::Config(err.to_string()))?;

        Ok(Self {
            http,
            registry,
            config,
        })
    }

    /// The breaker registry backing this client
    pub fn registry(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.registry
    }

    /// Perform a resilient JSON request and return the parsed response body.
    ///
    /// Non-2xx responses are failures and participate in retry and breaker
    /// accounting. When `config.fallback` is set, any terminal failure
    /// (including the outer deadline) yields the fallback value instead.
    pub async fn fetch(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        config: &FetchConfig,
    ) -> Result<Value> {
        let breaker = self.registry.breaker(&config.service_name).await;
        let attempt_timeout = config.timeout.unwrap_or(self.config.request_timeout);
        let headers = build_headers(&config.headers)?;

        let policy = RetryPolicy {
            max_attempts: config.max_retries.unwrap_or(self.config.max_retries),
            base_delay: self.config.retry_base_delay,
            backoff: BackoffStrategy::Exponential,
            on_retry: Some(Arc::new({
                let service = config.service_name.clone();
                move |attempt: u32, err: &ResilienceError| {
                    warn!(service = %service, attempt, error = %err, "Request attempt failed");
                }
            })),
        };

        let url = url.to_string();
        let body = body.cloned();

        let attempt = || {
            let breaker = Arc::clone(&breaker);
            let http = self.http.clone();
            let method = method.clone();
            let url = url.clone();
            let headers = headers.clone();
            let body = body.clone();

            async move {
                breaker
                    .execute(|| single_request(http, method, url, headers, body, attempt_timeout))
                    .await
            }
        };

        match &config.fallback {
            Some(fallback) => {
                let fallback = fallback.clone();
                with_fallback_and_timeout(
                    || with_retry(&policy, attempt),
                    move || async move { Ok(fallback) },
                    self.config.total_timeout,
                )
                .await
            }
            None => with_retry(&policy, attempt).await,
        }
    }

    /// GET a JSON endpoint and deserialize the response body
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, config: &FetchConfig) -> Result<T> {
        let value = self.fetch(Method::GET, url, None, config).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// POST a JSON body and return the parsed response
    pub async fn post_json(&self, url: &str, body: &Value, config: &FetchConfig) -> Result<Value> {
        self.fetch(Method::POST, url, Some(body), config).await
    }

    /// Breaker status for one service; `Unknown` if it was never called
    pub async fn breaker_status(&self, service_name: &str) -> BreakerStatus {
        self.registry.status(service_name).await
    }

    /// Breaker statuses for every service this client has called
    pub async fn all_breaker_statuses(&self) -> Vec<BreakerStatus> {
        self.registry.all_statuses().await
    }
}

/// One HTTP attempt: bounded by the per-attempt timeout (which aborts the
/// in-flight request), non-2xx rejected, body parsed as JSON
async fn single_request(
    http: reqwest::Client,
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Option<Value>,
    timeout: Duration,
) -> Result<Value> {
    let mut request = http.request(method, &url).headers(headers).timeout(timeout);
    if let Some(body) = &body {
        request = request.json(body);
    }

    let response = request.send().await.map_err(|err| {
        if err.is_timeout() {
            ResilienceError::Timeout { timeout }
        } else {
            ResilienceError::from(err)
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ResilienceError::Http {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
        });
    }

    Ok(response.json::<Value>().await?)
}

fn build_headers(extra: &HashMap<String, String>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    for (name, value) in extra {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| ResilienceError::Config(format!("Invalid header name '{name}': {err}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| ResilienceError::Config(format!("Invalid header value: {err}")))?;
        headers.insert(name, value);
    }

    Ok(headers)
}
