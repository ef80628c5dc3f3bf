//! Delivery counters for diagnostics

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters updated by the capture and flush paths
#[derive(Debug, Default)]
pub struct AgentStats {
    captured: AtomicU64,
    flushes: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    failed_flushes: AtomicU64,
}

/// Point-in-time copy of [`AgentStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Records appended to the buffer
    pub captured: u64,
    /// Delivery attempts for non-empty batches
    pub flushes: u64,
    /// Records accepted by the ingestion service
    pub delivered: u64,
    /// Records lost to failed deliveries
    pub dropped: u64,
    /// Delivery attempts that failed
    pub failed_flushes: u64,
}

impl AgentStats {
    pub(crate) fn record_capture(&self) {
        self.captured.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self, records: usize) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.delivered.fetch_add(records as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self, records: usize) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.failed_flushes.fetch_add(1, Ordering::Relaxed);
        self.dropped.fetch_add(records as u64, Ordering::Relaxed);
    }

    /// Copy the current values
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            captured: self.captured.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed_flushes: self.failed_flushes.load(Ordering::Relaxed),
        }
    }
}
