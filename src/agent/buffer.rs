//! In-memory buffer of records waiting for the next flush

use crate::types::CapturedLog;
use parking_lot::Mutex;

/// Insertion-ordered, thread-safe accumulator of pending records.
///
/// Every operation holds the lock only for a push, a clone or a swap; the
/// lock is never held while a batch is being delivered. Once sealed the buffer
/// rejects further appends.
#[derive(Debug, Default)]
pub struct LogBuffer {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<CapturedLog>,
    sealed: bool,
}

impl LogBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record and return the number of pending records after the
    /// append, or `None` if the buffer is sealed and the record was discarded
    pub fn push(&self, log: CapturedLog) -> Option<usize> {
        let mut inner = self.inner.lock();
        if inner.sealed {
            return None;
        }
        inner.entries.push(log);
        Some(inner.entries.len())
    }

    /// Detach everything captured so far, leaving a fresh empty buffer
    pub fn take(&self) -> Vec<CapturedLog> {
        std::mem::take(&mut self.inner.lock().entries)
    }

    /// Reject all future appends and detach what is pending
    pub fn seal(&self) -> Vec<CapturedLog> {
        let mut inner = self.inner.lock();
        inner.sealed = true;
        std::mem::take(&mut inner.entries)
    }

    /// Whether [`LogBuffer::seal`] has been called
    pub fn is_sealed(&self) -> bool {
        self.inner.lock().sealed
    }

    /// Copy of the pending records
    pub fn snapshot(&self) -> Vec<CapturedLog> {
        self.inner.lock().entries.clone()
    }

    /// Number of pending records
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}
