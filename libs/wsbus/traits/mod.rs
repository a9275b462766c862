//! # wsbus Traits
//!
//! Core traits and types shared by the state machine and its collaborators:
//!
//! - **Transport / Connector**: the duplex connection primitive supplied by the host
//! - **ReconnectionStrategy**: control reconnection delays
//! - **Listener**: receive decoded inbound frames
//! - **WsMessage**: a single text or binary frame

pub mod error;
pub mod listener;
pub mod message;
pub mod reconnect;
pub mod transport;

// Re-export commonly used types
pub use error::{Result, WsBusError};
pub use listener::{Listener, ListenerFn, ListenerId};
pub use message::WsMessage;
pub use reconnect::{ExponentialBackoff, FixedDelay, NeverReconnect, ReconnectionStrategy};
pub use transport::{Connector, Transport, TransportEvent, TransportId, TransportSignal};
