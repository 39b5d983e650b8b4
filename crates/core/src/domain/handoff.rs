//! Lock-free handoff between the control context and the audio thread
//!
//! A [`Mailbox`] holds at most one pending value. The producer replaces any
//! value the consumer has not picked up yet; the consumer takes the whole
//! value or nothing, so it can never observe a half-written one.
//!
//! Performance characteristics:
//! - Lock-free on both sides (crossbeam `ArrayQueue`)
//! - No allocations after construction
//! - Cache-padded to prevent false sharing between cores

use crossbeam::queue::ArrayQueue;
use crossbeam::utils::CachePadded;

/// Single-slot, last-value-wins mailbox
pub struct Mailbox<T> {
    slot: CachePadded<ArrayQueue<T>>,
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: CachePadded::new(ArrayQueue::new(1)),
        }
    }

    /// Publish a value (producer)
    ///
    /// Returns the pending value it displaced, if the consumer had not taken it.
    pub fn publish(&self, value: T) -> Option<T> {
        self.slot.force_push(value)
    }

    /// Take the pending value (consumer)
    pub fn take(&self) -> Option<T> {
        self.slot.pop()
    }

    /// Check whether a value is waiting
    pub fn is_pending(&self) -> bool {
        !self.slot.is_empty()
    }
}

impl<T> std::fmt::Debug for Mailbox<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailbox")
            .field("pending", &self.is_pending())
            .finish()
    }
}
