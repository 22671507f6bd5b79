//! Bounded-concurrency execution of independent async work units.

use crate::{chunking, error::ExecutorError};
use futures::stream::{FuturesUnordered, StreamExt};
use std::{fmt::Display, future::Future};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Runs a set of independent work units with a hard cap on how many are in
/// flight at once.
///
/// Failure policy is drain-then-report: a failing unit never prevents
/// already-started units from finishing, and the first recorded error is
/// surfaced only after everything in flight has settled. Cancellation is
/// cooperative: once the token fires no new unit is started, but in-flight
/// units run to completion.
#[derive(Debug, Clone)]
pub struct BoundedExecutor {
    max_concurrency: usize,
}

/// Counters describing one driver pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct DriveStats {
    /// Units handed to the runtime.
    pub submitted: usize,
    /// Units that ran to a terminal state (including failures and panics).
    pub settled: usize,
    /// Units never submitted because cancellation was requested first.
    pub skipped: usize,
}

impl BoundedExecutor {
    /// A cap of 0 resolves to the machine parallelism.
    pub fn new(max_concurrency: usize) -> Self {
        let max_concurrency = if max_concurrency == 0 {
            chunking::default_parallelism()
        } else {
            max_concurrency
        };
        BoundedExecutor { max_concurrency }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Core driver shared by the public variants and the batch processor.
    ///
    /// Each unit is spawned as its own task; the driver never holds more
    /// than `max_concurrency` in flight. Every settled unit is handed to
    /// `sink` together with its submission index, on the driver task, so
    /// downstream accounting needs no extra synchronization. A panicking
    /// unit is reported through `sink` as a failure.
    pub(crate) async fn drive<T, R, F, Fut>(
        &self,
        items: Vec<T>,
        worker: F,
        cancel: &CancellationToken,
        mut sink: impl FnMut(usize, Result<R, String>),
    ) -> DriveStats
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<R, String>> + Send + 'static,
    {
        let mut stats = DriveStats::default();
        let mut pending = items.into_iter().enumerate();
        let mut in_flight = FuturesUnordered::new();

        while !cancel.is_cancelled() {
            let Some((index, item)) = pending.next() else {
                break;
            };
            let handle = tokio::spawn(worker(item));
            in_flight.push(async move { (index, handle.await) });
            stats.submitted += 1;

            if in_flight.len() >= self.max_concurrency
                && let Some((index, joined)) = in_flight.next().await
            {
                stats.settled += 1;
                sink(index, flatten(joined));
            }
        }

        stats.skipped = pending.count();
        if stats.skipped > 0 {
            debug!(
                skipped = stats.skipped,
                in_flight = in_flight.len(),
                "cancellation requested, draining in-flight work"
            );
        }

        while let Some((index, joined)) = in_flight.next().await {
            stats.settled += 1;
            sink(index, flatten(joined));
        }
        stats
    }

    /// Transform variant: applies `worker` to every item and collects the
    /// outputs in completion order. When the token fires mid-run the
    /// outputs of units that were allowed to finish are still returned.
    pub async fn run<T, R, E, F, Fut>(
        &self,
        items: Vec<T>,
        worker: F,
        cancel: &CancellationToken,
    ) -> Result<Vec<R>, ExecutorError>
    where
        T: Send + 'static,
        R: Send + 'static,
        E: Display,
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let mut outputs = Vec::new();
        let mut failures: Vec<String> = Vec::new();

        self.drive(
            items,
            |item| {
                let unit = worker(item);
                async move { unit.await.map_err(|e| e.to_string()) }
            },
            cancel,
            |_, settled| match settled {
                Ok(output) => outputs.push(output),
                Err(message) => failures.push(message),
            },
        )
        .await;

        match failures.first() {
            Some(first) => Err(ExecutorError::WorkerFailed {
                failed: failures.len(),
                completed: outputs.len(),
                first: first.clone(),
            }),
            None => Ok(outputs),
        }
    }

    /// Side-effect variant of [`BoundedExecutor::run`].
    pub async fn run_each<T, E, F, Fut>(
        &self,
        items: Vec<T>,
        worker: F,
        cancel: &CancellationToken,
    ) -> Result<(), ExecutorError>
    where
        T: Send + 'static,
        E: Display,
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        self.run(items, worker, cancel).await.map(|_: Vec<()>| ())
    }
}

fn flatten<R>(joined: Result<Result<R, String>, JoinError>) -> Result<R, String> {
    match joined {
        Ok(settled) => settled,
        Err(join_error) => {
            warn!(%join_error, "worker task did not run to completion");
            Err(format!("worker task panicked: {join_error}"))
        }
    }
}
