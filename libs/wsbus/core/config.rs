use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default message retention while disconnected (15 s)
pub const DEFAULT_QUEUE_EXPIRATION_MS: i64 = 15_000;

/// Configuration for WsBusClient
///
/// Every field has a default, so a config can be deserialized from a
/// partial document:
///
/// ```ignore
/// let config: ClientConfig = serde_yaml::from_str("host: chat.local\nport: 8080")?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// URI scheme (`ws://` or `wss://`, the `://` is optional)
    pub scheme: String,

    /// Remote host; required unless `uri` is set
    pub host: Option<String>,

    /// Remote port; defaults to 80 for `ws://` and 443 for `wss://`
    pub port: Option<u16>,

    /// Request path, a leading `/` is added when missing
    pub path: String,

    /// Explicit URI, used verbatim instead of the composed one
    pub uri: Option<String>,

    /// Reconnect after the connection closes
    pub reconnect: bool,

    /// Buffer messages sent while the connection is not open
    pub queue_enabled: bool,

    /// Retention window for buffered messages in milliseconds
    /// (`0` = no buffering, negative = keep until flushed)
    pub queue_expiration_ms: i64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            scheme: "ws://".to_string(),
            host: None,
            port: None,
            path: "/".to_string(),
            uri: None,
            reconnect: true,
            queue_enabled: true,
            queue_expiration_ms: DEFAULT_QUEUE_EXPIRATION_MS,
        }
    }
}

impl ClientConfig {
    /// Config pointing at an explicit URI, all other options default
    pub fn with_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            ..Self::default()
        }
    }

    /// Config pointing at `host:port`, all other options default
    pub fn with_host(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: Some(host.into()),
            port: Some(port),
            ..Self::default()
        }
    }

    /// Buffering behavior derived from `queue_enabled` and `queue_expiration_ms`
    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy::from_millis(self.queue_enabled, self.queue_expiration_ms)
    }
}

/// How long messages sent while disconnected are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Messages sent while not open are dropped
    Disabled,
    /// Messages are kept until the next successful open
    Infinite,
    /// Messages older than the window are discarded
    Window(Duration),
}

impl RetentionPolicy {
    pub fn from_millis(enabled: bool, expiration_ms: i64) -> Self {
        match expiration_ms {
            _ if !enabled => RetentionPolicy::Disabled,
            0 => RetentionPolicy::Disabled,
            ms if ms < 0 => RetentionPolicy::Infinite,
            ms => RetentionPolicy::Window(Duration::from_millis(ms as u64)),
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        !matches!(self, RetentionPolicy::Disabled)
    }
}
