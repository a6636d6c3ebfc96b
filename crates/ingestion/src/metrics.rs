//! Ingestion metrics
//!
//! Atomic counters for cheap snapshots, mirrored to the `metrics` facade through
//! `observability`.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use observability::{RunningStats, StatsSummary};

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Datapoints admitted to the queue
    pub received: AtomicU64,

    /// Datapoints fully written
    pub written: AtomicU64,

    /// Retry attempts
    pub retried: AtomicU64,

    /// Datapoints that exhausted their retries
    pub failed: AtomicU64,

    /// Datapoints written whose daily intake increment failed
    pub intake_missed: AtomicU64,

    /// Failure reports lost because the failure channel was full
    pub failures_dropped: AtomicU64,

    /// Worker restarts by the supervisor
    pub worker_restarts: AtomicU64,

    /// Current queue length
    pub queue_len: AtomicUsize,

    write_latency_ms: Mutex<RunningStats>,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed write and its end-to-end latency
    pub fn record_written(&self, latency_ms: f64) {
        self.written.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut stats) = self.write_latency_ms.lock() {
            stats.push(latency_ms);
        }
    }

    pub fn record_retry(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_intake_missed(&self) {
        self.intake_missed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure_dropped(&self) {
        self.failures_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_worker_restart(&self) {
        self.worker_restarts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            intake_missed: self.intake_missed.load(Ordering::Relaxed),
            failures_dropped: self.failures_dropped.load(Ordering::Relaxed),
            worker_restarts: self.worker_restarts.load(Ordering::Relaxed),
            queue_len: self.queue_len.load(Ordering::Relaxed),
            write_latency_ms: self
                .write_latency_ms
                .lock()
                .map(|stats| StatsSummary::from(&*stats))
                .unwrap_or_default(),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub received: u64,
    pub written: u64,
    pub retried: u64,
    pub failed: u64,
    pub intake_missed: u64,
    pub failures_dropped: u64,
    pub worker_restarts: u64,
    pub queue_len: usize,
    pub write_latency_ms: StatsSummary,
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Ingestion Summary ===")?;
        writeln!(f, "Received: {}", self.received)?;
        writeln!(f, "Written: {}", self.written)?;
        writeln!(f, "Retries: {}", self.retried)?;
        writeln!(
            f,
            "Failed: {} (unreported: {})",
            self.failed, self.failures_dropped
        )?;
        writeln!(f, "Intake not counted: {}", self.intake_missed)?;
        writeln!(f, "Worker restarts: {}", self.worker_restarts)?;
        writeln!(f, "Queue length: {}", self.queue_len)?;
        write!(f, "Write latency (ms): {}", self.write_latency_ms)
    }
}
