//! Inbound frame dispatch
//!
//! ```text
//! Transport ──frame──> decode ──Inbound──> listener #1
//!                        │                 listener #2   (registration order,
//!                        │                 ...            failures isolated)
//!                        └─ not JSON: warn!, deliver Inbound::Raw
//! ```

use crate::error::{Result, WsBusError};
use crate::listener::{Listener, ListenerFn, ListenerId};
use crate::message::WsMessage;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, warn};

/// Wire envelope: `{ "name": ..., "data": ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub name: String,
    pub data: T,
}

/// An inbound frame as delivered to listeners
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Payload decoded as JSON
    Json(Value),
    /// Payload that could not be decoded, passed through untouched
    Raw(WsMessage),
}

impl Inbound {
    /// Decode `frame`, falling back to the raw frame on failure
    pub fn decode(frame: WsMessage) -> Self {
        let parsed = match &frame {
            WsMessage::Text(text) => serde_json::from_str::<Value>(text),
            WsMessage::Binary(bytes) => serde_json::from_slice::<Value>(bytes),
        };

        match parsed {
            Ok(value) => Inbound::Json(value),
            Err(e) => {
                warn!("Cannot parse JSON message ({}): {:?}", e, frame);
                Inbound::Raw(frame)
            }
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Inbound::Json(value) => Some(value),
            Inbound::Raw(_) => None,
        }
    }

    pub fn as_raw(&self) -> Option<&WsMessage> {
        match self {
            Inbound::Json(_) => None,
            Inbound::Raw(frame) => Some(frame),
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Inbound::Raw(_))
    }

    /// The envelope's `name` field, if present
    pub fn name(&self) -> Option<&str> {
        self.as_json()?.get("name")?.as_str()
    }

    /// The envelope's `data` field, if present
    pub fn data(&self) -> Option<&Value> {
        self.as_json()?.get("data")
    }

    /// Deserialize the frame into a typed envelope
    pub fn envelope<T: DeserializeOwned>(&self) -> Option<Envelope<T>> {
        let value = self.as_json()?;
        Envelope::<T>::deserialize(value).ok()
    }
}

/// Ordered set of listeners
///
/// No deduplication: registering the same callback twice yields two
/// invocations per frame.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: u64,
    listeners: Vec<(ListenerId, ListenerFn)>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: ListenerFn) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Listeners in registration order
    pub fn snapshot(&self) -> Vec<(ListenerId, ListenerFn)> {
        self.listeners.clone()
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Decodes inbound frames and fans them out to listeners
///
/// Cloning yields another handle to the same registry.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    registry: Arc<RwLock<ListenerRegistry>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener
    pub fn on<L: Listener>(&self, listener: L) -> ListenerId {
        self.registry.write().register(Arc::new(listener))
    }

    /// Register a type-erased listener
    ///
    /// Accepts a boxed [`ListenerFn`].
    ///
    /// # Errors
    /// `WsBusError::InvalidArgument` if `candidate` holds anything else.
    pub fn on_dynamic(&self, candidate: Box<dyn Any + Send + Sync>) -> Result<ListenerId> {
        let listener = candidate.downcast::<ListenerFn>().map_err(|_| {
            WsBusError::InvalidArgument("listener must be a callable ListenerFn".into())
        })?;
        Ok(self.registry.write().register(*listener))
    }

    pub fn listener_count(&self) -> usize {
        self.registry.read().len()
    }

    /// Decode `frame` and deliver it to every listener
    ///
    /// Returns the decoded frame. Listener errors and panics are logged and
    /// never interrupt delivery to the others.
    pub fn dispatch(&self, frame: WsMessage) -> Inbound {
        let inbound = Inbound::decode(frame);

        // Snapshot so listeners may register further listeners
        let listeners = self.registry.read().snapshot();

        for (id, listener) in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener.on_message(&inbound))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!("Listener {:?} failed: {}", id, e);
                }
                Err(panic) => {
                    error!("Listener {:?} panicked: {}", id, panic_message(&*panic));
                }
            }
        }

        inbound
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn test_decode_json() {
        let inbound = Inbound::decode(WsMessage::Text(
            r#"{"name":"newUser","data":{"name":"Peter"}}"#.into(),
        ));
        assert_eq!(inbound.name(), Some("newUser"));
        assert_eq!(inbound.data(), Some(&json!({"name": "Peter"})));

        let typed = inbound.envelope::<Value>().unwrap();
        assert_eq!(typed.name, "newUser");
    }

    #[test]
    fn test_decode_falls_back_to_raw() {
        let frame = WsMessage::Text("not json {".into());
        let inbound = Inbound::decode(frame.clone());
        assert_eq!(inbound, Inbound::Raw(frame));
        assert_eq!(inbound.name(), None);
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        let dispatcher = Dispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            dispatcher.on(move |_: &Inbound| -> Result<()> {
                order.lock().push(tag);
                Ok(())
            });
        }

        dispatcher.dispatch(WsMessage::Text("{}".into()));
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_failing_listener_is_isolated() {
        let dispatcher = Dispatcher::new();
        let reached = Arc::new(Mutex::new(0));

        dispatcher.on(|_: &Inbound| -> Result<()> { Err(WsBusError::Other("boom".into())) });
        dispatcher.on(|_: &Inbound| -> Result<()> { panic!("listener bug") });
        let counter = Arc::clone(&reached);
        dispatcher.on(move |_: &Inbound| -> Result<()> {
            *counter.lock() += 1;
            Ok(())
        });

        dispatcher.dispatch(WsMessage::Text("{}".into()));
        dispatcher.dispatch(WsMessage::Text("{}".into()));
        assert_eq!(*reached.lock(), 2);
    }

    #[test]
    fn test_on_dynamic_rejects_non_listener() {
        let dispatcher = Dispatcher::new();
        let err = dispatcher.on_dynamic(Box::new(42_u32)).unwrap_err();
        assert!(matches!(err, WsBusError::InvalidArgument(_)));
        assert_eq!(dispatcher.listener_count(), 0);

        let listener: ListenerFn = Arc::new(|_: &Inbound| -> Result<()> { Ok(()) });
        assert!(dispatcher.on_dynamic(Box::new(listener)).is_ok());
        assert_eq!(dispatcher.listener_count(), 1);
    }
}
