//! In-memory event buffer.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::events::Event;

// ============================================================================
// LogBuffer
// ============================================================================

/// Append-only event buffer that signals when it is full.
///
/// Appends and drains are serialized by one lock, so overlapping emissions
/// cannot interleave partial appends.
pub struct LogBuffer {
    max_size: usize,
    events: Mutex<Vec<Arc<Event>>>,
}

impl fmt::Debug for LogBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogBuffer")
            .field("max_size", &self.max_size)
            .field("len", &self.len())
            .finish()
    }
}

impl LogBuffer {
    /// Creates a buffer that reports full at `max_size` events.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            events: Mutex::new(Vec::with_capacity(max_size)),
        }
    }

    /// Appends an event. Returns `true` once the buffer holds `max_size`
    /// or more events.
    ///
    /// The append always succeeds; draining on the full signal is the
    /// caller's job.
    pub fn add_event(&self, event: Arc<Event>) -> bool {
        let mut events = self.events.lock();
        events.push(event);
        events.len() >= self.max_size
    }

    /// Takes every buffered event, leaving the buffer empty.
    pub fn flush_all(&self) -> Vec<Arc<Event>> {
        let mut events = self.events.lock();
        std::mem::replace(&mut *events, Vec::with_capacity(self.max_size))
    }

    /// Returns the number of buffered events.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns `true` if nothing is buffered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Returns the full threshold.
    #[inline]
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

// ============================================================================
// Tests
// ============================================================================
