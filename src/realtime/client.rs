// src/realtime/client.rs

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_tungstenite::tungstenite::protocol::Message as WsFrame;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ResilienceError, Result};
use crate::realtime::message::RealtimeMessage;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type SocketSink = SplitSink<Socket, WsFrame>;
type SocketStream = SplitStream<Socket>;

/// Observer for decoded inbound messages (heartbeats excluded)
pub type MessageHandler = Arc<dyn Fn(RealtimeMessage) + Send + Sync>;
/// Observer for connect/disconnect events
pub type EventHandler = Arc<dyn Fn() + Send + Sync>;
/// Observer for transport-level errors
pub type ErrorHandler = Arc<dyn Fn(String) + Send + Sync>;

/// Connection lifecycle of the realtime client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Open = 2,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Open,
            _ => ConnectionState::Disconnected,
        }
    }
}

#[derive(Clone, Default)]
struct Handlers {
    on_message: Option<MessageHandler>,
    on_connect: Option<EventHandler>,
    on_disconnect: Option<EventHandler>,
    on_error: Option<ErrorHandler>,
}

impl Handlers {
    fn message(&self, message: RealtimeMessage) {
        if let Some(handler) = &self.on_message {
            handler(message);
        }
    }

    fn connected(&self) {
        if let Some(handler) = &self.on_connect {
            handler();
        }
    }

    fn disconnected(&self) {
        if let Some(handler) = &self.on_disconnect {
            handler();
        }
    }

    fn error(&self, description: String) {
        if let Some(handler) = &self.on_error {
            handler(description);
        }
    }
}

/// Configuration for the realtime client
#[derive(Clone)]
pub struct RealtimeOptions {
    /// WebSocket endpoint (`ws://` or `wss://`)
    pub url: String,
    /// Delay before each reconnect attempt
    pub reconnect_interval: Duration,
    /// Reconnect attempts before giving up
    pub max_reconnect_attempts: u32,
    /// Interval between outbound heartbeats while connected
    pub heartbeat_interval: Duration,
    handlers: Handlers,
}

impl fmt::Debug for RealtimeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeOptions")
            .field("url", &self.url)
            .field("reconnect_interval", &self.reconnect_interval)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .finish()
    }
}

impl RealtimeOptions {
    /// Options for the given endpoint with default intervals
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_interval: Duration::from_secs(3),
            max_reconnect_attempts: 5,
            heartbeat_interval: Duration::from_secs(30),
            handlers: Handlers::default(),
        }
    }

    /// Set the delay before each reconnect attempt
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Set the reconnect attempt budget
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the outbound heartbeat interval
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Observe decoded inbound messages (heartbeats are filtered out)
    pub fn on_message(mut self, handler: impl Fn(RealtimeMessage) + Send + Sync + 'static) -> Self {
        self.handlers.on_message = Some(Arc::new(handler));
        self
    }

    /// Observe successful connections
    pub fn on_connect(mut self, handler: impl Fn() + Send + Sync + 'static) -> Self {
        self.handlers.on_connect = Some(Arc::new(handler));
        self
    }

    /// Observe disconnections (manual or not)
    pub fn on_disconnect(mut self, handler: impl Fn() + Send + Sync + 'static) -> Self {
        self.handlers.on_disconnect = Some(Arc::new(handler));
        self
    }

    /// Observe transport errors; the subsequent close event drives teardown
    pub fn on_error(mut self, handler: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.handlers.on_error = Some(Arc::new(handler));
        self
    }
}

/// State shared between the client handle and its driver task
struct Shared {
    state: AtomicU8,
    reconnect_attempts: AtomicU32,
    manual_close: AtomicBool,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
            reconnect_attempts: AtomicU32::new(0),
            manual_close: AtomicBool::new(false),
        }
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

enum Command {
    Send(RealtimeMessage),
    Disconnect,
}

/// Why the connection loop for one socket ended
#[derive(Debug, PartialEq, Eq)]
enum LoopExit {
    /// `disconnect()` was called; never reconnect
    Manual,
    /// The connection dropped or errored; reconnect unless told otherwise
    Lost,
}

/// Persistent WebSocket client with automatic reconnection and heartbeat.
///
/// `connect()` spawns a single driver task that owns the socket, the
/// heartbeat timer, and the reconnect timer. Every exit path runs through the
/// end of that task, so timers cannot accumulate across reconnect cycles.
pub struct RealtimeClient {
    options: RealtimeOptions,
    shared: Arc<Shared>,
    command_tx: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("options", &self.options)
            .field("state", &self.shared.state())
            .finish()
    }
}

impl RealtimeClient {
    /// Create a client; no connection is made until [`connect`](Self::connect)
    pub fn new(options: RealtimeOptions) -> Self {
        Self {
            options,
            shared: Arc::new(Shared::new()),
            command_tx: Mutex::new(None),
            driver: Mutex::new(None),
        }
    }

    /// Open the connection and start the driver task.
    ///
    /// Idempotent: calling while connecting or connected is a no-op. Must be
    /// called within a tokio runtime.
    pub fn connect(&self) -> Result<()> {
        if self.shared.state() != ConnectionState::Disconnected {
            debug!("Already connected or connecting, ignoring connect()");
            return Ok(());
        }

        Url::parse(&self.options.url)?;

        // A previous driver that gave up may still have a finished handle
        if let Some(old) = self.driver.lock().expect("driver lock poisoned").take() {
            drop(old);
        }

        self.shared.manual_close.store(false, Ordering::SeqCst);
        self.shared.reconnect_attempts.store(0, Ordering::SeqCst);
        self.shared.set_state(ConnectionState::Connecting);

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        *self.command_tx.lock().expect("command lock poisoned") = Some(command_tx);

        let options = self.options.clone();
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(run(options, shared, command_rx));
        *self.driver.lock().expect("driver lock poisoned") = Some(handle);

        Ok(())
    }

    /// Close the connection and suppress any further reconnects.
    ///
    /// Safe to call repeatedly or while a reconnect is pending.
    pub fn disconnect(&self) {
        self.shared.manual_close.store(true, Ordering::SeqCst);
        if let Some(tx) = self.command_tx.lock().expect("command lock poisoned").take() {
            let _ = tx.send(Command::Disconnect);
        }
    }

    /// Serialize and transmit a message.
    ///
    /// A documented no-op when the connection is not open: the message is
    /// dropped with a warning, never an error.
    pub fn send(&self, message: RealtimeMessage) {
        if self.shared.state() != ConnectionState::Open {
            warn!("Connection is not open, dropping outbound message");
            return;
        }

        if let Some(tx) = &*self.command_tx.lock().expect("command lock poisoned") {
            if tx.send(Command::Send(message)).is_err() {
                warn!("Driver task is gone, dropping outbound message");
            }
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Reconnect attempts made since the last successful open
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.reconnect_attempts.load(Ordering::SeqCst)
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        self.shared.manual_close.store(true, Ordering::SeqCst);
        if let Some(tx) = self.command_tx.lock().expect("command lock poisoned").take() {
            let _ = tx.send(Command::Disconnect);
        }
    }
}

/// Driver task: owns the socket across connect/reconnect cycles
async fn run(
    options: RealtimeOptions,
    shared: Arc<Shared>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    loop {
        shared.set_state(ConnectionState::Connecting);

        match connect_async(options.url.as_str()).await {
            Ok((socket, _response)) => {
                shared.reconnect_attempts.store(0, Ordering::SeqCst);
                shared.set_state(ConnectionState::Open);
                info!(url = %options.url, "WebSocket connected");
                options.handlers.connected();

                let exit = drive(socket, &options, &mut commands).await;

                shared.set_state(ConnectionState::Disconnected);
                options.handlers.disconnected();

                if exit == LoopExit::Manual {
                    break;
                }
            }
            Err(err) => {
                warn!(url = %options.url, error = %err, "WebSocket connection failed");
                options.handlers.error(err.to_string());
                shared.set_state(ConnectionState::Disconnected);
            }
        }

        if shared.manual_close.load(Ordering::SeqCst) {
            break;
        }

        let attempts = shared.reconnect_attempts.load(Ordering::SeqCst);
        if attempts >= options.max_reconnect_attempts {
            warn!(
                attempts,
                "Reconnect attempts exhausted, giving up until connect() is called again"
            );
            break;
        }

        shared.reconnect_attempts.fetch_add(1, Ordering::SeqCst);
        info!(
            attempt = attempts + 1,
            delay_ms = options.reconnect_interval.as_millis() as u64,
            "Scheduling reconnect"
        );

        if !wait_for_reconnect(options.reconnect_interval, &mut commands).await {
            break;
        }
        if shared.manual_close.load(Ordering::SeqCst) {
            break;
        }
    }

    shared.set_state(ConnectionState::Disconnected);
    debug!("Realtime driver task stopped");
}

/// Sleep out the reconnect delay, staying responsive to `disconnect()`.
/// Returns false when the wait was aborted by a disconnect.
async fn wait_for_reconnect(
    interval: Duration,
    commands: &mut mpsc::UnboundedReceiver<Command>,
) -> bool {
    let deadline = time::sleep(interval);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => return true,
            command = commands.recv() => match command {
                Some(Command::Disconnect) | None => return false,
                Some(Command::Send(_)) => {
                    warn!("Connection is not open, dropping outbound message");
                }
            }
        }
    }
}

/// Event loop for one live socket
async fn drive(
    socket: Socket,
    options: &RealtimeOptions,
    commands: &mut mpsc::UnboundedReceiver<Command>,
) -> LoopExit {
    let (mut sink, mut stream) = socket.split();

    // First heartbeat one full interval after open
    let mut heartbeat = time::interval_at(
        time::Instant::now() + options.heartbeat_interval,
        options.heartbeat_interval,
    );

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if let Err(err) = send_frame(&mut sink, &RealtimeMessage::heartbeat_now()).await {
                    warn!(error = %err, "Heartbeat send failed");
                    return LoopExit::Lost;
                }
            }
            command = commands.recv() => match command {
                Some(Command::Send(message)) => {
                    if let Err(err) = send_frame(&mut sink, &message).await {
                        warn!(error = %err, "Send failed, connection presumed lost");
                        return LoopExit::Lost;
                    }
                }
                Some(Command::Disconnect) | None => {
                    let _ = sink.send(WsFrame::Close(None)).await;
                    return LoopExit::Manual;
                }
            },
            frame = next_frame(&mut stream) => match frame {
                InboundFrame::Text(text) => {
                    if let Some(exit) = handle_text(&text, &mut sink, options).await {
                        return exit;
                    }
                }
                InboundFrame::Closed => return LoopExit::Lost,
                InboundFrame::Errored(description) => {
                    options.handlers.error(description);
                    return LoopExit::Lost;
                }
                InboundFrame::Ignored => {}
            }
        }
    }
}

enum InboundFrame {
    Text(String),
    Ignored,
    Closed,
    Errored(String),
}

async fn next_frame(stream: &mut SocketStream) -> InboundFrame {
    match stream.next().await {
        Some(Ok(WsFrame::Text(text))) => InboundFrame::Text(text.to_string()),
        Some(Ok(WsFrame::Close(_))) => {
            debug!("Server closed the connection");
            InboundFrame::Closed
        }
        // Pings are answered by the protocol layer; binary frames are not
        // part of the wire contract
        Some(Ok(_)) => InboundFrame::Ignored,
        Some(Err(err)) => {
            warn!(error = %err, "WebSocket read error");
            InboundFrame::Errored(err.to_string())
        }
        None => {
            debug!("WebSocket stream ended");
            InboundFrame::Closed
        }
    }
}

/// Decode one text frame. Heartbeats are echoed and never forwarded; anything
/// malformed is logged and dropped.
async fn handle_text(
    text: &str,
    sink: &mut SocketSink,
    options: &RealtimeOptions,
) -> Option<LoopExit> {
    match serde_json::from_str::<RealtimeMessage>(text) {
        Ok(RealtimeMessage::Heartbeat { timestamp }) => {
            debug!(peer_timestamp = timestamp, "Heartbeat received, echoing");
            if let Err(err) = send_frame(sink, &RealtimeMessage::heartbeat_now()).await {
                warn!(error = %err, "Heartbeat echo failed");
                return Some(LoopExit::Lost);
            }
            None
        }
        Ok(message) => {
            options.handlers.message(message);
            None
        }
        Err(err) => {
            warn!(error = %err, "Ignoring malformed frame");
            None
        }
    }
}

async fn send_frame(sink: &mut SocketSink, message: &RealtimeMessage) -> Result<()> {
    let text = serde_json::to_string(message)?;
    sink.send(WsFrame::Text(text.into()))
        .await
        .map_err(ResilienceError::from)
}
