// src/realtime/tests/mod.rs
//! Tests for the realtime update client


// Common test utilities: an in-process WebSocket server
pub(crate) mod utils {
    use std::net::SocketAddr;

    use chrono::{TimeZone, Utc};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::{accept_async, WebSocketStream};

    use crate::realtime::{Notification, RealtimeMessage, Severity};

    pub async fn bind() -> (SocketAddr, TcpListener) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test server");
        let addr = listener.local_addr().expect("local addr");
        (addr, listener)
    }

    pub async fn accept_ws(listener: &TcpListener) -> WebSocketStream<TcpStream> {
        let (stream, _) = listener.accept().await.expect("accept connection");
        accept_async(stream).await.expect("websocket handshake")
    }

    pub fn ws_url(addr: SocketAddr) -> String {
        format!("ws://{addr}")
    }

    /// A raw SOS frame as the backend would emit it
    pub fn sample_sos_json() -> String {
        r#"{
            "type": "sos",
            "id": "sos-1",
            "userId": "u-9",
            "userName": "Dana Resident",
            "unit": "12B",
            "location": {"lat": 1.29, "lng": 103.85},
            "createdAt": "2026-08-28T09:30:00Z",
            "status": "active"
        }"#
        .to_string()
    }

    pub fn sample_notification() -> RealtimeMessage {
        RealtimeMessage::Notification(Notification {
            id: "n-1".to_string(),
            title: "Parcel arrived".to_string(),
            message: "A parcel is waiting at the guard house".to_string(),
            severity: Severity::Info,
            link: None,
            created_at: Utc.with_ymd_and_hms(2026, 8, 28, 9, 30, 0).unwrap(),
        })
    }
}
