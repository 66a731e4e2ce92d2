// src/realtime/message.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A geographic coordinate attached to an SOS alert
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Lifecycle of an SOS alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SosStatus {
    Active,
    Resolved,
}

/// Severity of a pushed notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Success,
    Error,
}

/// An SOS alert raised by a resident
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SosAlert {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    pub created_at: DateTime<Utc>,
    pub status: SosStatus,
}

/// A pushed notification for the current user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Wire format for realtime frames: JSON text with a `type` tag
///
/// Frames with an unknown tag or malformed payload fail deserialization; the
/// client logs and drops them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RealtimeMessage {
    Sos(SosAlert),
    Notification(Notification),
    /// Keep-alive exchanged in both directions; timestamp is epoch milliseconds
    Heartbeat { timestamp: i64 },
}

impl RealtimeMessage {
    /// A heartbeat stamped with the current time
    pub fn heartbeat_now() -> Self {
        RealtimeMessage::Heartbeat {
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Whether this frame is a heartbeat
    pub fn is_heartbeat(&self) -> bool {
        matches!(self, RealtimeMessage::Heartbeat { .. })
    }
}
