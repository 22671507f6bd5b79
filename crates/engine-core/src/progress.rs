use serde::Serialize;
use std::sync::Arc;

/// Immutable snapshot of how far a bulk run has progressed.
///
/// Snapshots from one run are non-decreasing in `processed_items` and
/// `processed_items` never exceeds `total_items`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatchProgress {
    pub processed_items: usize,
    pub total_items: usize,
    pub percent_complete: f64,
}

impl BatchProgress {
    /// Builds a snapshot, clamping `processed` to `total`. A zero total
    /// reports as fully complete.
    pub fn new(processed: usize, total: usize) -> Self {
        let processed = processed.min(total);
        let percent_complete = if total == 0 {
            1.0
        } else {
            processed as f64 / total as f64
        };
        BatchProgress {
            processed_items: processed,
            total_items: total,
            percent_complete,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.processed_items == self.total_items
    }
}

/// Callback through which a run publishes its progress snapshots.
pub type ProgressCallback = Arc<dyn Fn(BatchProgress) + Send + Sync>;
