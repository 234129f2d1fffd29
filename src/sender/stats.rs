// Lock-free pipeline statistics
//
// Shared between producers (send path) and the dispatcher task, so every
// counter is a relaxed atomic; readers only ever see a snapshot.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PipelineStats {
    events_enqueued: AtomicU64,
    events_shed: AtomicU64,
    events_below_verbosity: AtomicU64,
    backlog_warnings: AtomicU64,
    serialization_failures: AtomicU64,
    batches_sent: AtomicU64,
    batches_failed: AtomicU64,
    bytes_sent: AtomicU64,
    http_attempts: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_enqueued(&self) {
        self.events_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Event rejected because the queue was full.
    pub fn record_shed(&self) {
        self.events_shed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_below_verbosity(&self) {
        self.events_below_verbosity.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backlog_warning(&self) {
        self.backlog_warnings.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_serialization_failure(&self) {
        self.serialization_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch_sent(&self, bytes: u64) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_batch_failed(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_http_attempt(&self) {
        self.http_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            events_enqueued: self.events_enqueued.load(Ordering::Relaxed),
            events_shed: self.events_shed.load(Ordering::Relaxed),
            events_below_verbosity: self.events_below_verbosity.load(Ordering::Relaxed),
            backlog_warnings: self.backlog_warnings.load(Ordering::Relaxed),
            serialization_failures: self.serialization_failures.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            http_attempts: self.http_attempts.load(Ordering::Relaxed),
        }
    }
}

/// Immutable copy of [`PipelineStats`] at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub events_enqueued: u64,
    pub events_shed: u64,
    pub events_below_verbosity: u64,
    pub backlog_warnings: u64,
    pub serialization_failures: u64,
    pub batches_sent: u64,
    pub batches_failed: u64,
    pub bytes_sent: u64,
    pub http_attempts: u64,
}

impl StatsSnapshot {
    /// Share of finished batches that reached the collector (1.0 when none
    /// were attempted).
    pub fn delivery_rate(&self) -> f64 {
        let total = self.batches_sent + self.batches_failed;
        if total == 0 {
            return 1.0;
        }
        self.batches_sent as f64 / total as f64
    }
}
