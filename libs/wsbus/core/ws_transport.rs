//! WebSocket transport over tokio-tungstenite
//!
//! Each connection attempt runs in its own task:
//!
//! ```text
//! ┌──────────────── transport task ────────────────┐
//! │ connect_async ──> split ──> select! {          │
//! │                     read.next()  ──> Message ──┼──> signals
//! │                     outbound.recv() ──> write  │
//! │                   }                            │
//! │ always ends with exactly one Closed signal ────┼──> signals
//! └────────────────────────────────────────────────┘
//! ```

use crate::connection_state::{AtomicConnectionState, ConnectionState};
use crate::endpoint::Endpoint;
use crate::error::{Result, WsBusError};
use crate::message::WsMessage;
use crate::transport::{Connector, Transport, TransportEvent, TransportId, TransportSignal};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;

/// Instructions from the transport handle to its task
#[derive(Debug)]
enum Outbound {
    Frame(WsMessage),
    Close,
}

/// Opens tokio-tungstenite connections
///
/// Signals from every transport it creates go to the same channel.
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone)]
pub struct TungsteniteConnector {
    signals: UnboundedSender<TransportEvent>,
}

impl TungsteniteConnector {
    pub fn new(signals: UnboundedSender<TransportEvent>) -> Self {
        Self { signals }
    }
}

impl Connector for TungsteniteConnector {
    type Transport = TungsteniteTransport;

    fn connect(&mut self, id: TransportId, endpoint: &Endpoint) -> TungsteniteTransport {
        let state = Arc::new(AtomicConnectionState::new(ConnectionState::Connecting));
        let (outbound_tx, outbound_rx) = unbounded_channel();

        tokio::spawn(run_transport(
            endpoint.uri().to_string(),
            id,
            Arc::clone(&state),
            outbound_rx,
            self.signals.clone(),
        ));

        TungsteniteTransport {
            state,
            outbound: outbound_tx,
        }
    }
}

/// Handle to one tokio-tungstenite connection
#[derive(Debug)]
pub struct TungsteniteTransport {
    state: Arc<AtomicConnectionState>,
    outbound: UnboundedSender<Outbound>,
}

impl Transport for TungsteniteTransport {
    fn ready_state(&self) -> ConnectionState {
        self.state.get()
    }

    fn transmit(&mut self, frame: WsMessage) -> Result<()> {
        let state = self.state.get();
        if state != ConnectionState::Open {
            return Err(WsBusError::NotOpen(state));
        }
        self.outbound
            .send(Outbound::Frame(frame))
            .map_err(|e| WsBusError::ChannelSend(e.to_string()))
    }

    fn close(&mut self) {
        match self.state.get() {
            ConnectionState::Connecting | ConnectionState::Open => {
                self.state.set(ConnectionState::Closing);
                let _ = self.outbound.send(Outbound::Close);
            }
            ConnectionState::Closing | ConnectionState::Closed => {}
        }
    }
}

async fn run_transport(
    uri: String,
    id: TransportId,
    state: Arc<AtomicConnectionState>,
    mut outbound_rx: UnboundedReceiver<Outbound>,
    signals: UnboundedSender<TransportEvent>,
) {
    let emit = |signal: TransportSignal| {
        // Receiver gone means the client was dropped
        let _ = signals.send(TransportEvent::new(id, signal));
    };

    let ws_stream = match connect_async(uri.as_str()).await {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            state.set(ConnectionState::Closed);
            emit(TransportSignal::Error(e.to_string()));
            emit(TransportSignal::Closed {
                reason: Some(format!("connect failed: {}", e)),
            });
            return;
        }
    };

    // close() during the handshake leaves the state at Closing
    if state
        .compare_exchange(ConnectionState::Connecting, ConnectionState::Open)
        .is_ok()
    {
        emit(TransportSignal::Opened);
    }

    let (mut write, mut read) = ws_stream.split();

    let reason = loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Close(frame))) => {
                        break frame
                            .map(|f| format!("closed by peer ({}): {}", f.code, f.reason))
                            .or_else(|| Some("closed by peer".to_string()));
                    }
                    Some(Ok(msg)) => {
                        if let Some(frame) = tungstenite_to_ws_message(msg) {
                            emit(TransportSignal::Message(frame));
                        }
                    }
                    Some(Err(e)) => {
                        emit(TransportSignal::Error(e.to_string()));
                        break Some(e.to_string());
                    }
                    None => break Some("stream ended".to_string()),
                }
            }

            cmd = outbound_rx.recv() => {
                match cmd {
                    Some(Outbound::Frame(frame)) => {
                        if let Err(e) = write.send(ws_message_to_tungstenite(frame)).await {
                            emit(TransportSignal::Error(e.to_string()));
                            break Some(e.to_string());
                        }
                    }
                    Some(Outbound::Close) | None => {
                        state.set(ConnectionState::Closing);
                        if let Err(e) = write.close().await {
                            debug!("Close handshake failed: {}", e);
                        }
                        break Some("closed by client".to_string());
                    }
                }
            }
        }
    };

    state.set(ConnectionState::Closed);
    emit(TransportSignal::Closed { reason });
}

/// Convert WsMessage to tungstenite Message
fn ws_message_to_tungstenite(msg: WsMessage) -> Message {
    match msg {
        WsMessage::Text(text) => Message::Text(text),
        WsMessage::Binary(data) => Message::Binary(data),
    }
}

/// Convert tungstenite Message to WsMessage
fn tungstenite_to_ws_message(msg: Message) -> Option<WsMessage> {
    match msg {
        Message::Text(text) => Some(WsMessage::Text(text)),
        Message::Binary(data) => Some(WsMessage::Binary(data)),
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => None,
    }
}
