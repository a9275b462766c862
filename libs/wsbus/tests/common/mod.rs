//! Common test utilities for wsbus integration tests
//!
//! Provides a scriptable in-memory transport for driving the connection
//! machine step by step, and an echo WebSocket server for end-to-end tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Notify;
use wsbus::{
    AtomicConnectionState, ConnectionState, Connector, Endpoint, Transport, TransportEvent,
    TransportId, TransportSignal, WsBusError, WsMessage,
};

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// State shared between a `MockConnector`, its transports and the test
#[derive(Default)]
pub struct MockShared {
    connects: Mutex<Vec<TransportId>>,
    states: Mutex<Vec<(TransportId, Arc<AtomicConnectionState>)>>,
    sent: Mutex<Vec<WsMessage>>,
    closed: Mutex<Vec<TransportId>>,
    /// Transmits accepted before every further transmit fails
    fail_after: Mutex<Option<usize>>,
}

impl MockShared {
    /// Ids of every transport opened so far, in order
    pub fn connects(&self) -> Vec<TransportId> {
        self.connects.lock().clone()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.lock().len()
    }

    /// Every frame accepted by any transport, in order
    pub fn sent(&self) -> Vec<WsMessage> {
        self.sent.lock().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|frame| frame.as_text().map(str::to_string))
            .collect()
    }

    /// Transports the machine asked to close
    pub fn closed(&self) -> Vec<TransportId> {
        self.closed.lock().clone()
    }

    pub fn fail_after(&self, accepted: usize) {
        *self.fail_after.lock() = Some(accepted);
    }

    pub fn never_fail(&self) {
        *self.fail_after.lock() = None;
    }

    pub fn state_of(&self, id: TransportId) -> Option<ConnectionState> {
        self.states
            .lock()
            .iter()
            .find(|(tid, _)| *tid == id)
            .map(|(_, state)| state.get())
    }

    fn set_state(&self, id: TransportId, state: ConnectionState) {
        if let Some((_, handle)) = self.states.lock().iter().find(|(tid, _)| *tid == id) {
            handle.set(state);
        }
    }

    /// Mark `id` open and build the matching signal
    pub fn open(&self, id: TransportId) -> TransportEvent {
        self.set_state(id, ConnectionState::Open);
        TransportEvent::new(id, TransportSignal::Opened)
    }

    /// Mark `id` closed and build the matching signal
    pub fn close(&self, id: TransportId, reason: &str) -> TransportEvent {
        self.set_state(id, ConnectionState::Closed);
        TransportEvent::new(
            id,
            TransportSignal::Closed {
                reason: Some(reason.to_string()),
            },
        )
    }

    pub fn error(&self, id: TransportId, reason: &str) -> TransportEvent {
        TransportEvent::new(id, TransportSignal::Error(reason.to_string()))
    }

    pub fn inbound(&self, id: TransportId, frame: impl Into<WsMessage>) -> TransportEvent {
        TransportEvent::new(id, TransportSignal::Message(frame.into()))
    }
}

/// In-memory connector
///
/// Without a signal channel the test feeds every lifecycle signal by hand.
/// With one (see [`MockConnector::auto`]) each transport opens immediately
/// and reports its close, so it can sit behind a running client.
pub struct MockConnector {
    shared: Arc<MockShared>,
    signals: Option<UnboundedSender<TransportEvent>>,
}

impl MockConnector {
    pub fn new() -> (Self, Arc<MockShared>) {
        let shared = Arc::new(MockShared::default());
        (
            Self {
                shared: Arc::clone(&shared),
                signals: None,
            },
            shared,
        )
    }

    pub fn auto(shared: Arc<MockShared>, signals: UnboundedSender<TransportEvent>) -> Self {
        Self {
            shared,
            signals: Some(signals),
        }
    }
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    fn connect(&mut self, id: TransportId, _endpoint: &Endpoint) -> MockTransport {
        let state = Arc::new(AtomicConnectionState::new(ConnectionState::Connecting));
        self.shared.connects.lock().push(id);
        self.shared.states.lock().push((id, Arc::clone(&state)));

        if let Some(signals) = &self.signals {
            state.set(ConnectionState::Open);
            let _ = signals.send(TransportEvent::new(id, TransportSignal::Opened));
        }

        MockTransport {
            id,
            state,
            shared: Arc::clone(&self.shared),
            signals: self.signals.clone(),
        }
    }
}

pub struct MockTransport {
    id: TransportId,
    state: Arc<AtomicConnectionState>,
    shared: Arc<MockShared>,
    signals: Option<UnboundedSender<TransportEvent>>,
}

impl Transport for MockTransport {
    fn ready_state(&self) -> ConnectionState {
        self.state.get()
    }

    fn transmit(&mut self, frame: WsMessage) -> wsbus::Result<()> {
        let state = self.state.get();
        if state != ConnectionState::Open {
            return Err(WsBusError::NotOpen(state));
        }

        let mut fail_after = self.shared.fail_after.lock();
        match fail_after.as_mut() {
            Some(0) => Err(WsBusError::WebSocket("mock transmit failure".into())),
            Some(remaining) => {
                *remaining -= 1;
                self.shared.sent.lock().push(frame);
                Ok(())
            }
            None => {
                self.shared.sent.lock().push(frame);
                Ok(())
            }
        }
    }

    fn close(&mut self) {
        self.shared.closed.lock().push(self.id);
        self.state.set(ConnectionState::Closing);

        if let Some(signals) = &self.signals {
            self.state.set(ConnectionState::Closed);
            let _ = signals.send(TransportEvent::new(
                self.id,
                TransportSignal::Closed {
                    reason: Some("closed by client".into()),
                },
            ));
        }
    }
}

/// A simple echo WebSocket server for testing
pub struct MockWsServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
}

impl MockWsServer {
    /// Create and start a new mock WebSocket server
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let shutdown = shutdown_clone.clone();
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, shutdown).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self { addr, shutdown }
    }

    async fn handle_connection(stream: tokio::net::TcpStream, shutdown: Arc<Notify>) {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::accept_async;

        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(msg)) => {
                            if msg.is_text() || msg.is_binary() {
                                if write.send(msg).await.is_err() {
                                    break;
                                }
                            } else if msg.is_close() {
                                break;
                            }
                        }
                        Some(Err(_)) | None => break,
                    }
                }
                _ = shutdown.notified() => {
                    break;
                }
            }
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Frame produced by `send("newUser", {"name": "Peter"})`
pub fn new_user_frame() -> String {
    r#"{"name":"newUser","data":{"name":"Peter"}}"#.to_string()
}
