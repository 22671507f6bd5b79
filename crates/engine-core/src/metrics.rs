use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    items_processed: AtomicU64,
    batches_completed: AtomicU64,
    batches_failed: AtomicU64,
    runs_cancelled: AtomicU64,
}

/// Diagnostics counters for the batch engine.
///
/// The handle is cheap to clone and share; the owner creates it once at
/// startup and passes it to whatever wants to record or read counters.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MetricsSnapshot {
    pub items_processed: u64,
    pub batches_completed: u64,
    pub batches_failed: u64,
    pub runs_cancelled: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    pub fn add_items(&self, count: u64) {
        self.inner.items_processed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_completed_batch(&self) {
        self.inner.batches_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_failed_batch(&self) {
        self.inner.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_cancelled_run(&self) {
        self.inner.runs_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            items_processed: self.inner.items_processed.load(Ordering::Relaxed),
            batches_completed: self.inner.batches_completed.load(Ordering::Relaxed),
            batches_failed: self.inner.batches_failed.load(Ordering::Relaxed),
            runs_cancelled: self.inner.runs_cancelled.load(Ordering::Relaxed),
        }
    }
}
