//! Transport seam
//!
//! The connection state machine never touches a socket directly. A
//! [`Connector`] opens one [`Transport`] per connection attempt and reports
//! its lifecycle back as [`TransportEvent`]s tagged with the attempt's
//! [`TransportId`]:
//!
//! ```text
//! Connector::connect(id) ──> Transport (transmit / close / ready_state)
//!        │
//!        └─ signals ──> Opened? ─> Message* ─> Error? ─> Closed (exactly once)
//! ```
//!
//! An implementation must deliver exactly one `Closed` per attempt, whether
//! the attempt failed to connect or was dropped later, and must not deliver
//! anything for that id after `Closed`.

use crate::core::connection_state::ConnectionState;
use crate::core::endpoint::Endpoint;
use crate::error::Result;
use crate::message::WsMessage;

/// Identifies one connection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransportId(pub u64);

/// Lifecycle notification from a transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportSignal {
    /// Handshake completed; the transport accepts `transmit`
    Opened,
    /// A data frame arrived
    Message(WsMessage),
    /// Non-fatal error notification (a `Closed` follows if the link is lost)
    Error(String),
    /// The transport is gone, for any reason
    Closed { reason: Option<String> },
}

/// Signal tagged with the attempt that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    pub id: TransportId,
    pub signal: TransportSignal,
}

impl TransportEvent {
    pub fn new(id: TransportId, signal: TransportSignal) -> Self {
        Self { id, signal }
    }
}

/// An already-negotiated duplex connection
pub trait Transport: Send {
    /// Current ready state as seen by the transport itself
    fn ready_state(&self) -> ConnectionState;

    /// Hand a frame to the transport
    ///
    /// Returns an error if the frame was not accepted; the caller keeps
    /// ownership of the retry decision.
    fn transmit(&mut self, frame: WsMessage) -> Result<()>;

    /// Begin closing; a `Closed` signal follows
    fn close(&mut self);
}

/// Factory for transports, one per connection attempt
pub trait Connector: Send + 'static {
    type Transport: Transport;

    /// Start a connection attempt towards `endpoint`
    ///
    /// Must not block. Progress is reported asynchronously through signals
    /// tagged with `id`.
    fn connect(&mut self, id: TransportId, endpoint: &Endpoint) -> Self::Transport;
}
