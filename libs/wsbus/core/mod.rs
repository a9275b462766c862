//! # wsbus core
//!
//! The connection state machine, its collaborators, and the tokio driver
//! that runs it behind the [`WsBusClient`] facade.
//!
//! ```text
//! WsBusClient::send ──> driver task ──> ConnectionMachine ──open──> Transport
//!                                          │   └─not open──> OutboundQueue
//!                      Transport signals ──┤
//!                      timers ─────────────┘──frames──> Dispatcher ──> listeners
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod connection_state;
pub mod dispatcher;
pub mod endpoint;
pub mod machine;
pub mod queue;
pub mod ws_transport;

// Re-export main types
pub use builder::WsBusClientBuilder;
pub use client::WsBusClient;
pub use config::{ClientConfig, RetentionPolicy};
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics};
pub use dispatcher::{Dispatcher, Envelope, Inbound, ListenerRegistry};
pub use endpoint::Endpoint;
pub use machine::{ClientEvent, ConnectionMachine, Scheduled, Timer};
pub use queue::{OutboundQueue, QueuedMessage};
pub use ws_transport::{TungsteniteConnector, TungsteniteTransport};

// Re-export traits for convenience
pub use crate::traits::*;
