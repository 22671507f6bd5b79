//! Bulk transformation of materialized item sets.
//!
//! The processor materializes its whole input before chunking. That is a
//! known scale limit: unbounded or streaming sources must be windowed by
//! the caller before they reach [`BatchProcessor::process`].

use crate::{chunking, error::ProcessingError, executor::BoundedExecutor};
use engine_core::{
    metrics::Metrics,
    progress::{BatchProgress, ProgressCallback},
};
use std::{fmt::Display, future::Future};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// One ordered slice of the input, processed as a single unit of work.
#[derive(Debug)]
pub struct Batch<T> {
    index: usize,
    items: Vec<T>,
}

impl<T> Batch<T> {
    pub(crate) fn new(index: usize, items: Vec<T>) -> Self {
        Batch { index, items }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

/// Tuning for one processor instance. Zero means "decide automatically"
/// for the batch size and "machine parallelism" for the cap. Fixed for
/// the lifetime of the processor.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    pub batch_size: usize,
    pub max_parallelism: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Cancelled,
    Failed,
}

/// A batch that did not produce output, recorded for drain-then-report.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub batch_index: usize,
    pub message: String,
}

/// Terminal state of one [`BatchProcessor::process`] call.
///
/// Output merged before the run ended is preserved in every terminal
/// state; a cancelled run is a valid partial result, not an error.
#[derive(Debug)]
pub struct BatchRun<R> {
    /// Aggregated outputs, in batch completion order (unordered across
    /// batches).
    pub items: Vec<R>,
    pub processed_items: usize,
    pub total_items: usize,
    /// Number of batches the run was split into.
    pub batches: usize,
    pub status: RunStatus,
    /// Non-empty exactly when `status == Failed`.
    pub failures: Vec<BatchFailure>,
}

impl<R> BatchRun<R> {
    fn empty() -> Self {
        BatchRun {
            items: Vec::new(),
            processed_items: 0,
            total_items: 0,
            batches: 0,
            status: RunStatus::Completed,
            failures: Vec::new(),
        }
    }

    /// Converts a failed run into the propagated error, for callers that
    /// want a plain `Result` and no partial output.
    pub fn into_items(self) -> Result<Vec<R>, ProcessingError> {
        match self.status {
            RunStatus::Failed => {
                let first = self
                    .failures
                    .first()
                    .map(|f| f.message.clone())
                    .unwrap_or_default();
                Err(ProcessingError::BatchFailed {
                    failed: self.failures.len(),
                    batches: self.batches,
                    first,
                })
            }
            RunStatus::Completed | RunStatus::Cancelled => Ok(self.items),
        }
    }
}

/// Splits a materialized input into adaptively sized batches, runs a
/// worker over them with bounded parallelism, and merges the outputs.
///
/// Progress snapshots are emitted from the single dispatch task, so
/// `processed_items` is non-decreasing across the callbacks of one run.
#[derive(Debug, Clone, Default)]
pub struct BatchProcessor {
    options: BatchOptions,
    metrics: Option<Metrics>,
}

impl BatchProcessor {
    pub fn new(options: BatchOptions) -> Self {
        BatchProcessor {
            options,
            metrics: None,
        }
    }

    /// Attaches a diagnostics observer owned by the caller.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn options(&self) -> BatchOptions {
        self.options
    }

    /// Processes `items` in parallel batches.
    ///
    /// `worker` receives each batch together with a child token of
    /// `cancel` for its own cooperative checkpoints. When `cancel` fires
    /// mid-run no further batch is submitted, in-flight batches drain and
    /// the partial aggregate comes back with `RunStatus::Cancelled`.
    /// Worker errors are drained the same way and come back on
    /// [`BatchRun::failures`] with `RunStatus::Failed`.
    pub async fn process<T, R, E, F, Fut>(
        &self,
        items: Vec<T>,
        worker: F,
        progress: Option<ProgressCallback>,
        cancel: CancellationToken,
    ) -> BatchRun<R>
    where
        T: Send + 'static,
        R: Send + 'static,
        E: Display,
        F: Fn(Batch<T>, CancellationToken) -> Fut,
        Fut: Future<Output = Result<Vec<R>, E>> + Send + 'static,
    {
        let total_items = items.len();
        if total_items == 0 {
            return BatchRun::empty();
        }

        let parallelism = if self.options.max_parallelism == 0 {
            chunking::default_parallelism()
        } else {
            self.options.max_parallelism
        };
        let batch_size = chunking::chunk_size(total_items, self.options.batch_size, parallelism);
        let batches = chunking::partition(items, batch_size);
        let batch_count = batches.len();
        debug!(
            total_items,
            batch_size,
            batches = batch_count,
            parallelism,
            "dispatching bulk run"
        );

        if let Some(report) = &progress {
            report(BatchProgress::new(0, total_items));
        }

        let executor = BoundedExecutor::new(self.options.max_parallelism);
        let mut merged: Vec<R> = Vec::with_capacity(total_items);
        let mut failures: Vec<BatchFailure> = Vec::new();
        let mut processed_items = 0usize;

        executor
            .drive(
                batches,
                |batch| {
                    let batch_len = batch.len();
                    let unit = worker(batch, cancel.child_token());
                    async move {
                        match unit.await {
                            Ok(outputs) => Ok((batch_len, outputs)),
                            Err(e) => Err(e.to_string()),
                        }
                    }
                },
                &cancel,
                |batch_index, settled| match settled {
                    Ok((batch_len, outputs)) => {
                        processed_items += batch_len;
                        merged.extend(outputs);
                        if let Some(metrics) = &self.metrics {
                            metrics.add_items(batch_len as u64);
                            metrics.add_completed_batch();
                        }
                        if let Some(report) = &progress {
                            report(BatchProgress::new(processed_items, total_items));
                        }
                    }
                    Err(message) => {
                        if let Some(metrics) = &self.metrics {
                            metrics.add_failed_batch();
                        }
                        failures.push(BatchFailure {
                            batch_index,
                            message,
                        });
                    }
                },
            )
            .await;

        let status = if !failures.is_empty() {
            RunStatus::Failed
        } else if cancel.is_cancelled() && processed_items < total_items {
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        };

        match status {
            RunStatus::Completed => {
                if let Some(report) = &progress {
                    report(BatchProgress::new(total_items, total_items));
                }
            }
            RunStatus::Cancelled => {
                if let Some(metrics) = &self.metrics {
                    metrics.add_cancelled_run();
                }
                info!(
                    processed_items,
                    total_items, "bulk run cancelled, returning partial aggregate"
                );
            }
            RunStatus::Failed => {
                info!(
                    failed = failures.len(),
                    batches = batch_count,
                    "bulk run failed, partial aggregate preserved"
                );
            }
        }

        BatchRun {
            items: merged,
            processed_items,
            total_items,
            batches: batch_count,
            status,
            failures,
        }
    }
}
