use std::time::Duration;

/// Trait for defining reconnection strategies
///
/// Implement this trait to control how the client should
/// behave when reconnecting after a disconnection.
pub trait ReconnectionStrategy: Send + Sync {
    /// Get the delay before the next reconnection attempt
    ///
    /// # Arguments
    /// * `attempt` - Number of connection attempts made since the last
    ///   successful open (the attempt that just closed included)
    ///
    /// # Returns
    /// * `Some(duration)` - Wait this long before reconnecting
    /// * `None` - Stop reconnecting
    fn next_delay(&self, attempt: usize) -> Option<Duration>;

    /// Reset the strategy state (called after successful connection)
    fn reset(&mut self);

    /// Check if we should continue reconnecting
    fn should_reconnect(&self, attempt: usize) -> bool;
}

/// Natural-exponential backoff
///
/// `delay = round(base × e^min(attempt, max_exponent))`
///
/// The default (10 ms base, exponent capped at 10) grows from 10 ms to a
/// ceiling of 220 265 ms and stays there.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    max_exponent: u32,
    max_attempts: Option<usize>,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff strategy
    ///
    /// # Arguments
    /// * `base` - Delay at attempt 0 (multiplied by e^n afterwards)
    /// * `max_exponent` - Exponent ceiling; attempts past it reuse the ceiling delay
    /// * `max_attempts` - Maximum number of attempts (None = unlimited)
    pub fn new(base: Duration, max_exponent: u32, max_attempts: Option<usize>) -> Self {
        Self {
            base,
            max_exponent,
            max_attempts,
        }
    }

    /// Delay for `attempt` ignoring the attempt limit
    pub fn delay(&self, attempt: usize) -> Duration {
        let n = attempt.min(self.max_exponent as usize) as f64;
        let millis = (self.base.as_millis() as f64 * n.exp()).round();
        Duration::from_millis(millis as u64)
    }

    /// The largest delay this strategy will ever return
    pub fn ceiling(&self) -> Duration {
        self.delay(self.max_exponent as usize)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(10), 10, None)
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }
        Some(self.delay(attempt))
    }

    fn reset(&mut self) {
        // Stateless
    }

    fn should_reconnect(&self, attempt: usize) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

/// Fixed delay reconnection strategy
///
/// Always waits the same amount of time between reconnection attempts
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<usize>,
}

impl FixedDelay {
    /// Create a new fixed delay strategy
    ///
    /// # Arguments
    /// * `delay` - The fixed delay between reconnects
    /// * `max_attempts` - Maximum number of attempts (None = unlimited)
    pub fn new(delay: Duration, max_attempts: Option<usize>) -> Self {
        Self { delay, max_attempts }
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }
        Some(self.delay)
    }

    fn reset(&mut self) {}

    fn should_reconnect(&self, attempt: usize) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

/// Never reconnect strategy
///
/// Installed when `reconnect` is disabled: the client stays closed after the
/// first disconnection.
#[derive(Debug, Clone)]
pub struct NeverReconnect;

impl ReconnectionStrategy for NeverReconnect {
    fn next_delay(&self, _attempt: usize) -> Option<Duration> {
        None
    }

    fn reset(&mut self) {}

    fn should_reconnect(&self, _attempt: usize) -> bool {
        false
    }
}
