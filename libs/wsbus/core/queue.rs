//! Outbound message buffer
//!
//! Messages sent while the connection is not open wait here until the next
//! successful open. Entries are kept in insertion order, which is also
//! chronological order, so expiration only ever trims a prefix:
//!
//! ```text
//! head                                   tail
//!  [t0] [t1] [t2] [t3] [t4]      t0 <= t1 <= ... <= t4
//!  └─ expired ─┘└─ retained ──┘
//! ```

use crate::config::RetentionPolicy;
use crate::message::WsMessage;
use crate::transport::Transport;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::debug;

/// A buffered outbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub enqueued_at: Instant,
    pub payload: WsMessage,
}

/// FIFO buffer with time-based expiration
#[derive(Debug)]
pub struct OutboundQueue {
    retention: RetentionPolicy,
    entries: VecDeque<QueuedMessage>,
}

impl OutboundQueue {
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            retention,
            entries: VecDeque::new(),
        }
    }

    #[inline]
    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    /// Whether `enqueue` keeps messages at all
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.retention.is_enabled()
    }

    /// Append `payload`, stamped with `now`
    ///
    /// Returns the delay after which a sweep should run, if the retention
    /// policy has a finite window. With `RetentionPolicy::Disabled` the
    /// message is discarded and nothing is scheduled.
    pub fn enqueue(&mut self, payload: WsMessage, now: Instant) -> Option<Duration> {
        match self.retention {
            RetentionPolicy::Disabled => None,
            RetentionPolicy::Infinite => {
                self.entries.push_back(QueuedMessage { enqueued_at: now, payload });
                None
            }
            RetentionPolicy::Window(window) => {
                self.entries.push_back(QueuedMessage { enqueued_at: now, payload });
                Some(window)
            }
        }
    }

    /// Drop every message whose age at `now` has reached the retention window
    ///
    /// Stops at the first message still inside the window. Returns the
    /// number of messages removed.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let RetentionPolicy::Window(window) = self.retention else {
            return 0;
        };

        let expired = self
            .entries
            .iter()
            .take_while(|entry| now.saturating_duration_since(entry.enqueued_at) >= window)
            .count();
        self.entries.drain(..expired);
        expired
    }

    /// Transmit buffered messages in order until the queue is empty
    ///
    /// A message the transport refuses goes back to the head and the flush
    /// stops there, so nothing is lost or sent twice. Returns the number of
    /// messages handed to the transport.
    pub fn flush_to<T>(&mut self, transport: &mut T) -> usize
    where
        T: Transport + ?Sized,
    {
        let mut sent = 0;
        while let Some(entry) = self.entries.pop_front() {
            match transport.transmit(entry.payload.clone()) {
                Ok(()) => sent += 1,
                Err(e) => {
                    debug!("Flush interrupted after {} messages: {}", sent, e);
                    self.entries.push_front(entry);
                    break;
                }
            }
        }
        sent
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedMessage> {
        self.entries.iter()
    }
}
