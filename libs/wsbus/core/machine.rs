//! Connection state machine
//!
//! Owns the transport lifecycle, the attempt counter, the outbound queue and
//! the dispatcher. It performs no I/O and never sleeps: every input is a
//! method call, and any timer it needs is handed back as a [`Scheduled`]
//! value for the caller to arm.
//!
//! ```text
//!            start / Reconnect timer (attempts += 1)
//!   Closed ──────────────────────────────────────> Connecting
//!     ^                                                │ Opened
//!     │ Closed                                         v   (attempts = 0, flush queue)
//!     └───────────── Closing <──── shutdown ────────  Open
//!     ^                                                │
//!     └──────────── Closed (schedule delay(attempts)) ─┘
//! ```
//!
//! Error signals never schedule anything: while open they are suppressed,
//! otherwise the `Closed` signal that follows drives the transition.

use crate::config::ClientConfig;
use crate::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
use crate::dispatcher::{Dispatcher, Inbound};
use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::message::WsMessage;
use crate::queue::OutboundQueue;
use crate::reconnect::{ExponentialBackoff, NeverReconnect, ReconnectionStrategy};
use crate::transport::{Connector, Transport, TransportEvent, TransportId, TransportSignal};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One-shot timers the machine asks its driver to arm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timer {
    /// Start the next connection attempt
    Reconnect,
    /// Expire old queued messages
    QueueSweep,
}

/// A timer request: fire `timer` after `delay`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduled {
    pub timer: Timer,
    pub delay: Duration,
}

/// Diagnostic notifications, observability only
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A connection attempt started
    Connecting { attempt: usize },
    /// The connection is open
    Connected,
    /// The transport closed
    Disconnected { reason: Option<String> },
    /// The next attempt is scheduled after `delay`
    Reconnecting { attempt: usize, delay: Duration },
    /// A transport error outside the open state
    Error(String),
    /// No further attempts will be made
    GaveUp { attempts: usize },
}

/// Sans-IO connection state machine
pub struct ConnectionMachine<C: Connector> {
    endpoint: Endpoint,
    connector: C,
    /// The single live transport, tagged with its attempt id
    transport: Option<(TransportId, C::Transport)>,
    next_transport_id: u64,
    state: ConnectionState,
    attempts: usize,
    reconnect: bool,
    strategy: Box<dyn ReconnectionStrategy>,
    queue: OutboundQueue,
    dispatcher: Dispatcher,
    shared_state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    /// Current diagnostic subscriber, if any
    event_tx: Option<Sender<ClientEvent>>,
    stopped: bool,
}

impl<C: Connector> ConnectionMachine<C> {
    /// Build a machine from configuration
    ///
    /// The machine starts out Closed; call [`start`](Self::start) to make
    /// the first attempt.
    ///
    /// # Errors
    /// `WsBusError::Configuration` if the endpoint cannot be resolved.
    pub fn new(config: &ClientConfig, connector: C) -> Result<Self> {
        let endpoint = Endpoint::resolve(config)?;
        let strategy: Box<dyn ReconnectionStrategy> = if config.reconnect {
            Box::new(ExponentialBackoff::default())
        } else {
            Box::new(NeverReconnect)
        };
        Ok(Self {
            endpoint,
            connector,
            transport: None,
            next_transport_id: 0,
            state: ConnectionState::Closed,
            attempts: 0,
            reconnect: config.reconnect,
            strategy,
            queue: OutboundQueue::new(config.retention()),
            dispatcher: Dispatcher::new(),
            shared_state: Arc::new(AtomicConnectionState::new(ConnectionState::Closed)),
            metrics: Arc::new(AtomicMetrics::new()),
            event_tx: None,
            stopped: false,
        })
    }

    /// Replace the reconnection strategy
    ///
    /// Ignored when reconnection is disabled in the configuration.
    pub fn with_strategy(mut self, strategy: Box<dyn ReconnectionStrategy>) -> Self {
        if self.reconnect {
            self.strategy = strategy;
        } else {
            debug!("Reconnect disabled, keeping NeverReconnect strategy");
        }
        self
    }

    /// Use an existing dispatcher (and its listeners)
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Make the first connection attempt
    ///
    /// No-op unless the machine is Closed with no transport and not shut down.
    pub fn start(&mut self) {
        if self.stopped || self.transport.is_some() || self.state != ConnectionState::Closed {
            debug!("Start ignored in state {:?}", self.state);
            return;
        }
        self.begin_attempt();
    }

    /// Send a frame, buffering or dropping it when the connection is not open
    ///
    /// Returns a sweep timer when the frame was buffered under a finite
    /// retention window.
    pub fn send(&mut self, frame: WsMessage, now: Instant) -> Option<Scheduled> {
        if self.state == ConnectionState::Open && !self.queue.is_empty() {
            // Earlier frames are still waiting: keep send order
            let scheduled = self.buffer(frame, now);
            self.flush();
            return scheduled;
        }

        if self.state == ConnectionState::Open {
            if let Some((_, transport)) = self.transport.as_mut() {
                match transport.transmit(frame.clone()) {
                    Ok(()) => {
                        self.metrics.increment_sent();
                        return None;
                    }
                    Err(e) => {
                        debug!("Transmit failed while open, buffering: {}", e);
                    }
                }
            }
        }

        self.buffer(frame, now)
    }

    /// Process a lifecycle signal from a transport
    pub fn handle_transport(&mut self, event: TransportEvent, now: Instant) -> Option<Scheduled> {
        let is_active = matches!(&self.transport, Some((id, _)) if *id == event.id);
        if !is_active {
            debug!("Ignoring {:?} from stale transport {:?}", event.signal, event.id);
            return None;
        }

        match event.signal {
            TransportSignal::Opened => {
                self.on_open(now);
                None
            }
            TransportSignal::Message(frame) => {
                self.metrics.increment_received();
                self.dispatcher.dispatch(frame);
                None
            }
            TransportSignal::Error(reason) => {
                self.on_error(reason);
                None
            }
            TransportSignal::Closed { reason } => self.on_close(reason),
        }
    }

    /// Process an expired timer
    pub fn handle_timer(&mut self, timer: Timer, now: Instant) -> Option<Scheduled> {
        match timer {
            Timer::Reconnect => {
                if self.stopped
                    || self.transport.is_some()
                    || self.state != ConnectionState::Closed
                {
                    debug!("Ignoring reconnect timer in state {:?}", self.state);
                    return None;
                }
                self.metrics.increment_reconnects();
                self.begin_attempt();
            }
            Timer::QueueSweep => {
                let expired = self.queue.sweep(now);
                if expired > 0 {
                    debug!("Expired {} queued messages", expired);
                    self.metrics.add_expired(expired);
                    self.metrics.set_queue_depth(self.queue.len());
                }
            }
        }
        None
    }

    /// Close the active transport and stop reconnecting
    pub fn shutdown(&mut self) {
        self.stopped = true;
        match self.transport.as_mut() {
            Some((_, transport)) => {
                info!("Closing connection to {}", self.endpoint);
                transport.close();
                self.set_state(ConnectionState::Closing);
            }
            None => self.set_state(ConnectionState::Closed),
        }
    }

    /// Deliver an inbound frame to the listeners directly
    pub fn dispatch(&self, frame: WsMessage) -> Inbound {
        self.dispatcher.dispatch(frame)
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Attempts made since the last successful open
    #[inline]
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Shut down and fully closed
    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.stopped && self.state == ConnectionState::Closed
    }

    pub fn active_transport(&self) -> Option<TransportId> {
        self.transport.as_ref().map(|(id, _)| *id)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn queue(&self) -> &OutboundQueue {
        &self.queue
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn state_handle(&self) -> Arc<AtomicConnectionState> {
        Arc::clone(&self.shared_state)
    }

    pub fn metrics_handle(&self) -> Arc<AtomicMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Receiver for diagnostic events
    ///
    /// Replaces any previous subscriber. Events emitted while nobody is
    /// subscribed are discarded, and dropping the receiver stops delivery.
    pub fn events(&mut self) -> Receiver<ClientEvent> {
        let (tx, rx) = unbounded();
        self.event_tx = Some(tx);
        rx
    }

    fn begin_attempt(&mut self) {
        self.attempts += 1;
        let id = TransportId(self.next_transport_id);
        self.next_transport_id += 1;

        self.set_state(ConnectionState::Connecting);
        self.emit(ClientEvent::Connecting {
            attempt: self.attempts,
        });
        debug!("Connecting to {} (attempt {})", self.endpoint, self.attempts);

        let transport = self.connector.connect(id, &self.endpoint);
        self.transport = Some((id, transport));
    }

    fn on_open(&mut self, now: Instant) {
        if self.state != ConnectionState::Connecting {
            debug!("Open signal ignored in state {:?}", self.state);
            return;
        }

        self.set_state(ConnectionState::Open);
        self.attempts = 0;
        self.strategy.reset();

        let expired = self.queue.sweep(now);
        if expired > 0 {
            self.metrics.add_expired(expired);
        }

        self.flush();

        info!("Connected to {}", self.endpoint);
        self.emit(ClientEvent::Connected);
    }

    /// Hand queued frames to the active transport, oldest first
    fn flush(&mut self) {
        if let Some((_, transport)) = self.transport.as_mut() {
            let flushed = self.queue.flush_to(transport);
            self.metrics.add_sent(flushed);
            if flushed > 0 {
                debug!("Flushed {} queued messages", flushed);
            }
        }
        self.metrics.set_queue_depth(self.queue.len());
    }

    fn on_error(&mut self, reason: String) {
        let transport_state = self
            .transport
            .as_ref()
            .map(|(_, transport)| transport.ready_state())
            .unwrap_or(ConnectionState::Closed);

        if transport_state == ConnectionState::Open {
            debug!("Suppressing transport error while open: {}", reason);
            return;
        }

        // The close signal follows and owns the reconnect decision
        warn!("Transport error ({:?}): {}", transport_state, reason);
        self.emit(ClientEvent::Error(reason));
    }

    fn on_close(&mut self, reason: Option<String>) -> Option<Scheduled> {
        self.transport = None;
        self.set_state(ConnectionState::Closed);
        self.emit(ClientEvent::Disconnected {
            reason: reason.clone(),
        });

        if self.stopped {
            info!("Connection to {} closed", self.endpoint);
            return None;
        }

        match self.strategy.next_delay(self.attempts) {
            Some(delay) => {
                info!(
                    "Attempt {} closed ({}), retrying in {:.3}s",
                    self.attempts,
                    reason.as_deref().unwrap_or("no reason"),
                    delay.as_secs_f64()
                );
                self.emit(ClientEvent::Reconnecting {
                    attempt: self.attempts + 1,
                    delay,
                });
                Some(Scheduled {
                    timer: Timer::Reconnect,
                    delay,
                })
            }
            None => {
                if self.reconnect {
                    warn!(
                        "Reconnection strategy exhausted after {} attempts, staying closed",
                        self.attempts
                    );
                } else {
                    info!("Connection closed and reconnect is disabled");
                }
                self.emit(ClientEvent::GaveUp {
                    attempts: self.attempts,
                });
                None
            }
        }
    }

    fn buffer(&mut self, frame: WsMessage, now: Instant) -> Option<Scheduled> {
        if !self.queue.is_enabled() {
            debug!("Connection not open and queuing disabled, dropping message");
            self.metrics.increment_dropped();
            return None;
        }

        let sweep_after = self.queue.enqueue(frame, now);
        self.metrics.increment_queued();
        self.metrics.set_queue_depth(self.queue.len());

        sweep_after.map(|delay| Scheduled {
            timer: Timer::QueueSweep,
            delay,
        })
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        self.shared_state.set(state);
    }

    fn emit(&mut self, event: ClientEvent) {
        if let Some(tx) = &self.event_tx {
            if tx.send(event).is_err() {
                self.event_tx = None;
            }
        }
    }
}
