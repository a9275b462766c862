use crate::builder::WsBusClientBuilder;
use crate::config::ClientConfig;
use crate::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics};
use crate::dispatcher::{Dispatcher, Envelope};
use crate::endpoint::Endpoint;
use crate::error::{Result, WsBusError};
use crate::listener::{Listener, ListenerId};
use crate::machine::{ClientEvent, ConnectionMachine, Scheduled, Timer};
use crate::message::WsMessage;
use crate::reconnect::ReconnectionStrategy;
use crate::transport::{Connector, TransportEvent};
use crate::ws_transport::TungsteniteConnector;
use crossbeam_channel::Receiver;
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

/// How long `shutdown` waits for the transport to close
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Internal command messages for client control
#[derive(Debug)]
enum ClientCommand {
    /// Send a frame (transmit, buffer, or drop)
    Send(WsMessage),
    /// Close the connection and stop reconnecting
    Shutdown,
}

/// Resilient WebSocket messaging client
///
/// Connecting starts as soon as the client is built. `send` never fails
/// because the connection is down: frames are transmitted immediately when
/// open, buffered otherwise (or dropped if buffering is disabled), and the
/// buffer is flushed in order on the next successful open.
///
/// All state lives in a single driver task; the client itself is a cheap
/// handle that must be created inside a tokio runtime.
///
/// # Example
///
/// ```ignore
/// let client = WsBusClient::new(ClientConfig::with_host("bus.local", 8080))?;
/// client.on(|msg: &Inbound| -> wsbus::Result<()> {
///     println!("{:?}", msg);
///     Ok(())
/// });
/// client.send("newUser", &serde_json::json!({ "name": "Peter" }))?;
/// ```
pub struct WsBusClient {
    endpoint: Endpoint,
    dispatcher: Dispatcher,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    command_tx: UnboundedSender<ClientCommand>,
    event_rx: Receiver<ClientEvent>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl WsBusClient {
    /// Validate `config` and start connecting over WebSocket
    ///
    /// # Errors
    /// `WsBusError::Configuration` for an unusable endpoint, or
    /// `WsBusError::Other` when called outside a tokio runtime.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::spawn(config, None, Dispatcher::new(), TungsteniteConnector::new)
    }

    /// Start a client over a custom transport
    ///
    /// `make_connector` receives the channel its transports must report
    /// lifecycle signals on.
    pub fn with_connector<C, F>(config: ClientConfig, make_connector: F) -> Result<Self>
    where
        C: Connector,
        F: FnOnce(UnboundedSender<TransportEvent>) -> C,
    {
        Self::spawn(config, None, Dispatcher::new(), make_connector)
    }

    /// Start building a client
    pub fn builder() -> WsBusClientBuilder {
        WsBusClientBuilder::new()
    }

    pub(crate) fn spawn<C, F>(
        config: ClientConfig,
        strategy: Option<Box<dyn ReconnectionStrategy>>,
        dispatcher: Dispatcher,
        make_connector: F,
    ) -> Result<Self>
    where
        C: Connector,
        F: FnOnce(UnboundedSender<TransportEvent>) -> C,
    {
        // Configuration errors surface before anything is spawned
        let (signal_tx, signal_rx) = unbounded_channel();
        let mut machine = ConnectionMachine::new(&config, make_connector(signal_tx))?
            .with_dispatcher(dispatcher.clone());
        if let Some(strategy) = strategy {
            machine = machine.with_strategy(strategy);
        }

        if tokio::runtime::Handle::try_current().is_err() {
            return Err(WsBusError::Other(
                "WsBusClient must be created inside a tokio runtime".into(),
            ));
        }

        let endpoint = machine.endpoint().clone();
        let state = machine.state_handle();
        let metrics = machine.metrics_handle();
        let event_rx = machine.events();
        let (command_tx, command_rx) = unbounded_channel();

        machine.start();
        info!("WsBus client connecting to {}", endpoint);

        let task_handle = tokio::spawn(run_driver(machine, command_rx, signal_rx));

        Ok(Self {
            endpoint,
            dispatcher,
            state,
            metrics,
            command_tx,
            event_rx,
            task_handle: Some(task_handle),
        })
    }

    /// Send `{ "name": name, "data": data }`
    ///
    /// Succeeds whether or not the connection is open.
    ///
    /// # Errors
    /// `WsBusError::Encode` if `data` cannot be serialized, or
    /// `WsBusError::ChannelSend` if the driver task has stopped.
    pub fn send<T>(&self, name: &str, data: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_string(&Envelope {
            name: name.to_string(),
            data,
        })?;
        self.send_raw(WsMessage::Text(payload))
    }

    /// Send a pre-encoded frame with the same buffering rules as `send`
    pub fn send_raw(&self, frame: WsMessage) -> Result<()> {
        self.command_tx
            .send(ClientCommand::Send(frame))
            .map_err(|e| WsBusError::ChannelSend(e.to_string()))
    }

    /// Register a listener for inbound frames
    ///
    /// The same callback may be registered more than once; each
    /// registration is invoked separately.
    pub fn on<L: Listener>(&self, listener: L) -> ListenerId {
        self.dispatcher.on(listener)
    }

    /// Register a type-erased listener (a boxed `ListenerFn`)
    ///
    /// # Errors
    /// `WsBusError::InvalidArgument` if `candidate` is not a listener.
    pub fn on_dynamic(&self, candidate: Box<dyn Any + Send + Sync>) -> Result<ListenerId> {
        self.dispatcher.on_dynamic(candidate)
    }

    /// Get current connection state
    #[inline]
    pub fn connection_state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Check if the connection is open
    #[inline]
    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// The resolved endpoint
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Get current metrics
    pub fn metrics(&self) -> Metrics {
        self.metrics.snapshot(self.state.get())
    }

    /// Try to receive a diagnostic event (non-blocking)
    pub fn try_recv_event(&self) -> Option<ClientEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Receive a diagnostic event (blocking)
    pub fn recv_event(&self) -> std::result::Result<ClientEvent, crossbeam_channel::RecvError> {
        self.event_rx.recv()
    }

    /// Another receiver for diagnostic events
    pub fn events(&self) -> Receiver<ClientEvent> {
        self.event_rx.clone()
    }

    /// Close the connection and stop the driver task
    ///
    /// Waits up to two seconds for the transport to close before aborting
    /// the driver.
    pub async fn shutdown(mut self) -> Result<()> {
        info!("Shutting down WsBus client");

        let _ = self.command_tx.send(ClientCommand::Shutdown);

        if let Some(mut handle) = self.task_handle.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    return Err(WsBusError::Other(format!("driver task failed: {}", e)));
                }
                Err(_) => {
                    warn!("Transport did not close within {:?}, aborting", SHUTDOWN_GRACE);
                    handle.abort();
                }
            }
        }

        Ok(())
    }
}

/// Driver loop: feeds commands, transport signals and timers into the machine
async fn run_driver<C: Connector>(
    mut machine: ConnectionMachine<C>,
    mut command_rx: UnboundedReceiver<ClientCommand>,
    mut signal_rx: UnboundedReceiver<TransportEvent>,
) {
    let (timer_tx, mut timer_rx) = unbounded_channel::<Timer>();
    let mut commands_open = true;

    loop {
        let scheduled = tokio::select! {
            cmd = command_rx.recv(), if commands_open => {
                match cmd {
                    Some(ClientCommand::Send(frame)) => machine.send(frame, Instant::now()),
                    Some(ClientCommand::Shutdown) => {
                        machine.shutdown();
                        None
                    }
                    None => {
                        debug!("Client handle dropped, closing connection");
                        commands_open = false;
                        machine.shutdown();
                        None
                    }
                }
            }

            Some(event) = signal_rx.recv() => machine.handle_transport(event, Instant::now()),

            Some(timer) = timer_rx.recv() => machine.handle_timer(timer, Instant::now()),

            else => break,
        };

        if let Some(scheduled) = scheduled {
            arm_timer(&timer_tx, scheduled);
        }

        if machine.is_terminated() {
            break;
        }
    }

    debug!("Driver task exiting");
}

/// Fire-and-forget one-shot timer
fn arm_timer(timer_tx: &UnboundedSender<Timer>, scheduled: Scheduled) {
    let tx = timer_tx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(scheduled.delay).await;
        // Driver gone means the client was discarded
        let _ = tx.send(scheduled.timer);
    });
}
