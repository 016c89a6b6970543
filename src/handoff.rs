//! Hands frames from a producer thread (the sensor side) to the thread that
//! runs the upsampling.

use std::sync::{Mutex, MutexGuard};

/// Single slot holding the latest published value.
///
/// A newer value replaces one that was not taken yet, so the consumer always
/// works on the most recent complete frame and never on a mix of two. Share
/// it between threads with an `Arc`.
#[derive(Debug)]
pub struct FrameMailbox<T> {
    slot: Mutex<Option<T>>,
}

impl<T> Default for FrameMailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FrameMailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        // The slot only ever holds whole values, a panic while holding the
        // lock can't leave it half written.
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores `value`, returning the previous one if it was never taken.
    pub fn publish(&self, value: T) -> Option<T> {
        self.lock().replace(value)
    }

    /// Takes the latest value, leaving the slot empty.
    pub fn take(&self) -> Option<T> {
        self.lock().take()
    }

    /// Whether a value was published since the last [`FrameMailbox::take`].
    pub fn is_dirty(&self) -> bool {
        self.lock().is_some()
    }
}
