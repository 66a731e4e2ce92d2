// src/resilience/tests/mod.rs
//! Tests for resilience features

mod retry_tests;

// Common test utilities for resilience testing
pub(crate) mod utils {
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// One scripted answer from the in-process HTTP server
    pub struct ScriptedResponse {
        pub status: u16,
        pub body: String,
    }

    impl ScriptedResponse {
        pub fn ok(body: &str) -> Self {
            Self {
                status: 200,
                body: body.to_string(),
            }
        }

        pub fn error(status: u16) -> Self {
            Self {
                status,
                body: r#"{"error":"simulated failure"}"#.to_string(),
            }
        }
    }

    /// Spawn a minimal HTTP server that answers one connection per scripted
    /// response, in order, then stops accepting.
    ///
    /// Responses carry `Connection: close` so every client attempt opens a
    /// fresh connection and lines up with the script.
    pub async fn spawn_http_server(script: Vec<ScriptedResponse>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test server");
        let addr = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            for response in script {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };

                // Drain the request head; the tests only send small requests
                let mut buf = [0u8; 8192];
                let _ = stream.read(&mut buf).await;

                let head = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    response.status,
                    reason(response.status),
                    response.body.len()
                );
                let _ = stream.write_all(head.as_bytes()).await;
                let _ = stream.write_all(response.body.as_bytes()).await;
                let _ = stream.flush().await;
            }
        });

        addr
    }

    fn reason(status: u16) -> &'static str {
        match status {
            200 => "OK",
            404 => "Not Found",
            500 => "Internal Server Error",
            503 => "Service Unavailable",
            _ => "",
        }
    }

    /// An address nothing listens on; connections are refused immediately
    pub async fn unreachable_addr() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);
        addr
    }
}
