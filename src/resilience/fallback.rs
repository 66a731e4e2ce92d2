// src/resilience/fallback.rs

use std::future::Future;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time;
use tracing::{debug, warn};

use crate::error::{ResilienceError, Result};

/// Bound an operation by a deadline.
///
/// The operation races against a timer; when the timer wins, the operation's
/// future is dropped and [`ResilienceError::Timeout`] carrying the configured
/// duration is returned. A timeout stops the *wait*, not necessarily the
/// underlying work.
pub async fn with_timeout<T, F, Fut>(operation: F, timeout: Duration) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match time::timeout(timeout, operation()).await {
        Ok(result) => result,
        Err(_) => Err(ResilienceError::Timeout { timeout }),
    }
}

/// Run a primary operation, substituting the fallback's result on any failure.
///
/// The primary's error is absorbed by contract and only logged; callers that
/// need to observe it must not use a fallback.
pub async fn with_fallback<T, P, PFut, B, BFut>(primary: P, fallback: B) -> Result<T>
where
    P: FnOnce() -> PFut,
    PFut: Future<Output = Result<T>>,
    B: FnOnce() -> BFut,
    BFut: Future<Output = Result<T>>,
{
    match primary().await {
        Ok(value) => Ok(value),
        Err(err) => {
            debug!(error = %err, "Primary operation failed, using fallback");
            fallback().await
        }
    }
}

/// Fallback over a deadline-bounded primary: a timeout counts as a primary
/// failure and triggers the fallback
pub async fn with_fallback_and_timeout<T, P, PFut, B, BFut>(
    primary: P,
    fallback: B,
    timeout: Duration,
) -> Result<T>
where
    P: FnOnce() -> PFut,
    PFut: Future<Output = Result<T>>,
    B: FnOnce() -> BFut,
    BFut: Future<Output = Result<T>>,
{
    with_fallback(|| with_timeout(primary, timeout), fallback).await
}

/// Single-slot "last known good" cache
///
/// Holds the most recently fetched value with no expiry. Successful fetches
/// overwrite the slot; failed fetches are served the cached value when one
/// exists, so consumers keep seeing stale-but-valid data through an outage.
#[derive(Debug, Default)]
pub struct FallbackCache<T> {
    slot: RwLock<Option<T>>,
}

impl<T: Clone> FallbackCache<T> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    /// Run the fetch, caching on success and falling back to the last good
    /// value on failure.
    ///
    /// Fails with [`ResilienceError::NoCachedData`] only when the fetch fails
    /// and nothing was ever cached.
    pub async fn fetch<F, Fut>(&self, fetch_fn: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match fetch_fn().await {
            Ok(value) => {
                let mut slot = self.slot.write().await;
                *slot = Some(value.clone());
                Ok(value)
            }
            Err(err) => {
                let cached = self.slot.read().await.clone();
                match cached {
                    Some(value) => {
                        warn!(error = %err, "Fetch failed, serving last known good value");
                        Ok(value)
                    }
                    None => {
                        debug!(error = %err, "Fetch failed with empty cache");
                        Err(ResilienceError::NoCachedData)
                    }
                }
            }
        }
    }

    /// Current cached value, if any
    pub async fn get(&self) -> Option<T> {
        self.slot.read().await.clone()
    }

    /// Drop the cached value
    pub async fn clear(&self) {
        let mut slot = self.slot.write().await;
        *slot = None;
    }
}
