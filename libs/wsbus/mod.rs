//! # wsbus
//!
//! A resilient duplex-messaging client over a single WebSocket connection.
//!
//! ## Features
//!
//! - **Fire and forget**: `send` never fails because the socket is down;
//!   messages are buffered and flushed in order once the connection opens
//! - **Automatic reconnection**: natural-exponential backoff capped at ~220 s
//! - **Time-bounded buffering**: queued messages expire after a configurable window
//! - **Listener fan-out**: every inbound frame reaches every listener, in
//!   registration order, with per-listener failure isolation
//! - **Pluggable transport**: the state machine only sees the `Transport` and
//!   `Connector` traits; a tokio-tungstenite transport ships by default

pub mod traits;
pub mod core;

// Re-export all traits
pub use traits::*;

// Re-export core client functionality
pub use self::core::{
    builder, client, config, connection_state, dispatcher, endpoint, machine, queue,
    ws_transport,
    builder::WsBusClientBuilder,
    client::WsBusClient,
    config::{ClientConfig, RetentionPolicy},
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics},
    dispatcher::{Dispatcher, Envelope, Inbound, ListenerRegistry},
    endpoint::Endpoint,
    machine::{ClientEvent, ConnectionMachine, Scheduled, Timer},
    queue::{OutboundQueue, QueuedMessage},
    ws_transport::{TungsteniteConnector, TungsteniteTransport},
};

/// Type alias for Result with WsBusError
pub type Result<T> = std::result::Result<T, traits::WsBusError>;
