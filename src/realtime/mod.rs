// src/realtime/mod.rs
//! Realtime update client.
//!
//! Receives push-style events (SOS alerts, notifications) over a persistent
//! WebSocket connection with automatic reconnection and heartbeat. Callers
//! that cannot hold a socket open fall back to polling through the resilient
//! HTTP client instead.

mod client;
mod message;

#[cfg(test)]
mod tests;

// Re-export key components
pub use client::{
    ConnectionState, ErrorHandler, EventHandler, MessageHandler, RealtimeClient, RealtimeOptions,
};
pub use message::{GeoPoint, Notification, RealtimeMessage, Severity, SosAlert, SosStatus};
