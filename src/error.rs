// src/error.rs

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResilienceError {
    /// The named service's circuit breaker is open; the call was short-circuited
    /// without touching the network
    #[error("Circuit breaker for service '{service}' is open")]
    CircuitOpen { service: String },

    /// A deadline elapsed before the operation settled
    #[error("Operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// The server answered with a non-2xx status
    #[error("HTTP {status} {status_text}")]
    Http { status: u16, status_text: String },

    /// The request could not be sent or the response could not be read
    #[error("Request error: {0}")]
    Request(String),

    /// A fetch failed and no previously cached value exists to fall back to
    #[error("No cached data available")]
    NoCachedData,

    /// Data serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// WebSocket or other connection-level errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),
}

// Map transport errors onto the crate taxonomy so retry and circuit breaker
// accounting see every failure mode the same way.
impl From<reqwest::Error> for ResilienceError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            ResilienceError::Http {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("").to_string(),
            }
        } else if err.is_decode() {
            ResilienceError::Serialization(err.to_string())
        } else {
            ResilienceError::Request(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ResilienceError {
    fn from(err: serde_json::Error) -> Self {
        ResilienceError::Serialization(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ResilienceError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ResilienceError::Connection(err.to_string())
    }
}

impl From<url::ParseError> for ResilienceError {
    fn from(err: url::ParseError) -> Self {
        ResilienceError::Config(err.to_string())
    }
}

// define a Result type alias for convenience
pub type Result<T> = std::result::Result<T, ResilienceError>;
