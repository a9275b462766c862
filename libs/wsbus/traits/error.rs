use crate::core::connection_state::ConnectionState;
use thiserror::Error;

/// Main error type for wsbus
#[derive(Error, Debug)]
pub enum WsBusError {
    /// Invalid or missing endpoint data, raised while building the client
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A value passed to a registration call is not usable as a listener
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// WebSocket protocol or I/O error reported by the transport
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Transmit attempted on a transport that is not open
    #[error("Transport not open (state: {0:?})")]
    NotOpen(ConnectionState),

    /// Outbound payload could not be serialized
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Channel send error
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// Generic error
    #[error("Error: {0}")]
    Other(String),
}

/// Result type for wsbus operations
pub type Result<T> = std::result::Result<T, WsBusError>;
