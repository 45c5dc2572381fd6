//! Adapter counters
//!
//! Monotonic counters updated with relaxed atomics; read through
//! [`AdapterMetrics::snapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

/// Operational counters for one adapter
#[derive(Debug, Default)]
pub struct AdapterMetrics {
    selects_issued: AtomicU64,
    items_written: AtomicU64,
    items_deleted: AtomicU64,
    consistency_polls: AtomicU64,
    consistency_timeouts: AtomicU64,
    records_filtered: AtomicU64,
}

impl AdapterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// One select call sent to the store
    pub fn increment_selects(&self) {
        self.selects_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_items_written(&self) {
        self.items_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_items_deleted(&self) {
        self.items_deleted.fetch_add(1, Ordering::Relaxed);
    }

    /// One read of the consistency sentinel
    pub fn increment_consistency_polls(&self) {
        self.consistency_polls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_consistency_timeouts(&self) {
        self.consistency_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Records dropped by the local residual filter
    pub fn add_records_filtered(&self, count: u64) {
        self.records_filtered.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            selects_issued: self.selects_issued.load(Ordering::Relaxed),
            items_written: self.items_written.load(Ordering::Relaxed),
            items_deleted: self.items_deleted.load(Ordering::Relaxed),
            consistency_polls: self.consistency_polls.load(Ordering::Relaxed),
            consistency_timeouts: self.consistency_timeouts.load(Ordering::Relaxed),
            records_filtered: self.records_filtered.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`AdapterMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub selects_issued: u64,
    pub items_written: u64,
    pub items_deleted: u64,
    pub consistency_polls: u64,
    pub consistency_timeouts: u64,
    pub records_filtered: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        assert_eq!(AdapterMetrics::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_increments() {
        let metrics = AdapterMetrics::new();
        metrics.increment_selects();
        metrics.increment_selects();
        metrics.increment_items_written();
        metrics.add_records_filtered(4);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.selects_issued, 2);
        assert_eq!(snapshot.items_written, 1);
        assert_eq!(snapshot.records_filtered, 4);
        assert_eq!(snapshot.items_deleted, 0);
    }
}
