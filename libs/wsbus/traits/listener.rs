use crate::core::dispatcher::Inbound;
use crate::error::Result;
use std::sync::Arc;

/// Handle returned by listener registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

impl ListenerId {
    /// Numeric value of the id (registration sequence number)
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Receives every inbound frame
///
/// Listeners are invoked sequentially on the client's driver task, once per
/// frame and in registration order. They should return quickly.
///
/// # Errors
/// A returned error is logged and does not stop delivery to the remaining
/// listeners. The same holds for a panic.
///
/// # Example
///
/// ```ignore
/// client.on(|msg: &Inbound| -> wsbus::Result<()> {
///     if msg.name() == Some("newUser") {
///         println!("user joined: {:?}", msg.data());
///     }
///     Ok(())
/// });
/// ```
pub trait Listener: Send + Sync + 'static {
    fn on_message(&self, message: &Inbound) -> Result<()>;
}

impl<F> Listener for F
where
    F: Fn(&Inbound) -> Result<()> + Send + Sync + 'static,
{
    fn on_message(&self, message: &Inbound) -> Result<()> {
        self(message)
    }
}

/// Type-erased listener accepted by `on_dynamic`
pub type ListenerFn = Arc<dyn Listener>;
