//! Session intents and the FIFO hand-off between producers and the resolver.
//!
//! The queue itself never suspends anyone. Producers and the resolver call
//! the non-blocking `try_*` operations and, when they cannot proceed, park
//! on [`SPACE_AVAILABLE`] or [`INTENTS_AVAILABLE`] until the other side
//! notifies them.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use clickstream_core::Payload;

use crate::deterministic::ChannelId;

/// Notified whenever an intent is published.
pub const INTENTS_AVAILABLE: ChannelId = ChannelId("intents.available");

/// Notified whenever an intent is taken from a bounded queue.
pub const SPACE_AVAILABLE: ChannelId = ChannelId("intents.space");

/// A signal that some visitor wants to start a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionIntent {
    pub intent_id: String,
    pub ts_utc: DateTime<Utc>,
    pub sim_time_s: f64,
    /// `"baseline"` or `"channel:<name>"`
    pub intent_source: String,
    pub channel: String,
    pub audience_id: Option<String>,
    pub payload: Payload,
}

/// Returned by [`IntentQueue::try_publish`] when a bounded queue is full.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueFull(pub SessionIntent);

/// Bounded or unbounded FIFO of intents.
#[derive(Debug, Clone, Default)]
pub struct IntentQueue {
    items: VecDeque<SessionIntent>,
    capacity: Option<usize>,
    published: u64,
    taken: u64,
}

impl IntentQueue {
    /// Creates a queue; `None` means unbounded.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
            published: 0,
            taken: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_bounded(&self) -> bool {
        self.capacity.is_some()
    }

    pub fn is_full(&self) -> bool {
        self.capacity
            .is_some_and(|capacity| self.items.len() >= capacity)
    }

    /// Appends an intent, handing it back when the queue is full.
    ///
    /// # Errors
    ///
    /// - `QueueFull` - If bounded and at capacity; carries the rejected intent
    pub fn try_publish(&mut self, intent: SessionIntent) -> Result<(), QueueFull> {
        if self.is_full() {
            return Err(QueueFull(intent));
        }
        self.items.push_back(intent);
        self.published += 1;
        Ok(())
    }

    /// Removes the oldest intent.
    pub fn try_take(&mut self) -> Option<SessionIntent> {
        let intent = self.items.pop_front()?;
        self.taken += 1;
        Some(intent)
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    pub fn taken(&self) -> u64 {
        self.taken
    }
}
