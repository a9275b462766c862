use crate::client::WsBusClient;
use crate::config::ClientConfig;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::listener::Listener;
use crate::reconnect::ReconnectionStrategy;
use crate::transport::{Connector, TransportEvent};
use crate::ws_transport::TungsteniteConnector;
use tokio::sync::mpsc::UnboundedSender;

/// Fluent builder for [`WsBusClient`]
///
/// Listeners added here are registered before the first connection attempt,
/// so no inbound frame can be missed.
///
/// # Example
/// ```ignore
/// let client = WsBusClient::builder()
///     .host("bus.local")
///     .port(8080)
///     .path("events")
///     .queue_expiration_ms(-1)             // keep until flushed
///     .listener(|msg: &Inbound| -> wsbus::Result<()> {
///         println!("{:?}", msg.name());
///         Ok(())
///     })
///     .build()?;
/// ```
pub struct WsBusClientBuilder {
    config: ClientConfig,
    strategy: Option<Box<dyn ReconnectionStrategy>>,
    dispatcher: Dispatcher,
}

impl WsBusClientBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self::from_config(ClientConfig::default())
    }

    /// Start from an existing configuration
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            strategy: None,
            dispatcher: Dispatcher::new(),
        }
    }

    /// Explicit URI, used verbatim
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.config.uri = Some(uri.into());
        self
    }

    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.config.scheme = scheme.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.config.path = path.into();
        self
    }

    pub fn reconnect(mut self, enabled: bool) -> Self {
        self.config.reconnect = enabled;
        self
    }

    pub fn queue_enabled(mut self, enabled: bool) -> Self {
        self.config.queue_enabled = enabled;
        self
    }

    /// Retention window in milliseconds (`0` = no buffering, negative = infinite)
    pub fn queue_expiration_ms(mut self, ms: i64) -> Self {
        self.config.queue_expiration_ms = ms;
        self
    }

    /// Replace the default natural-exponential backoff
    ///
    /// Has no effect when reconnection is disabled.
    pub fn reconnect_strategy(mut self, strategy: impl ReconnectionStrategy + 'static) -> Self {
        self.strategy = Some(Box::new(strategy));
        self
    }

    /// Register a listener before connecting
    pub fn listener<L: Listener>(self, listener: L) -> Self {
        self.dispatcher.on(listener);
        self
    }

    /// The configuration collected so far
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Validate the configuration and start connecting over WebSocket
    pub fn build(self) -> Result<WsBusClient> {
        WsBusClient::spawn(
            self.config,
            self.strategy,
            self.dispatcher,
            TungsteniteConnector::new,
        )
    }

    /// Validate the configuration and start connecting over a custom transport
    pub fn build_with_connector<C, F>(self, make_connector: F) -> Result<WsBusClient>
    where
        C: Connector,
        F: FnOnce(UnboundedSender<TransportEvent>) -> C,
    {
        WsBusClient::spawn(self.config, self.strategy, self.dispatcher, make_connector)
    }
}

impl Default for WsBusClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
