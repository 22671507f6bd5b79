//! End-to-end scenarios for the batch engine.

use crate::utils;
use engine_core::metrics::Metrics;
use engine_processing::processor::{Batch, BatchOptions, BatchProcessor, RunStatus};
use model::fleet::Vehicle;
use std::{
    convert::Infallible,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn refresh_of_2500_vehicles_lands_in_four_batches() {
    let processor = BatchProcessor::new(BatchOptions {
        batch_size: 0,
        max_parallelism: 4,
    });
    let (progress, seen) = utils::recording_progress();

    let run = processor
        .process(
            utils::fleet(2_500),
            |batch: Batch<Vehicle>, _| async move { Ok::<_, Infallible>(batch.into_items()) },
            Some(progress),
            CancellationToken::new(),
        )
        .await;

    // middle band with parallelism 4: max(50, 2500 / 4) = 625
    assert_eq!(run.batches, 4);
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.items.len(), 2_500);

    let snapshots = seen.lock().unwrap();
    assert_eq!(snapshots.first().unwrap().processed_items, 0);
    assert_eq!(snapshots.first().unwrap().percent_complete, 0.0);
    let last = snapshots.last().unwrap();
    assert_eq!(last.processed_items, 2_500);
    assert_eq!(last.percent_complete, 1.0);
    assert!(
        snapshots
            .windows(2)
            .all(|w| w[0].processed_items <= w[1].processed_items)
    );
}

#[tokio::test(start_paused = true)]
async fn in_flight_batches_never_exceed_the_configured_parallelism() {
    let processor = BatchProcessor::new(BatchOptions {
        batch_size: 50,
        max_parallelism: 3,
    });
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let run = processor
        .process(
            utils::fleet(1_000),
            {
                let current = current.clone();
                let peak = peak.clone();
                move |batch: Batch<Vehicle>, _| {
                    let current = current.clone();
                    let peak = peak.clone();
                    async move {
                        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(3)).await;
                        current.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, Infallible>(batch.into_items())
                    }
                }
            },
            None,
            CancellationToken::new(),
        )
        .await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.batches, 20);
    assert!(
        peak.load(Ordering::SeqCst) <= 3,
        "peak concurrency {} exceeded the cap",
        peak.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn cancellation_keeps_the_completed_prefix() {
    let processor = BatchProcessor::new(BatchOptions {
        batch_size: 0,
        max_parallelism: 1,
    });
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    let run = processor
        .process(
            utils::fleet(2_500),
            move |batch: Batch<Vehicle>, _| {
                let trigger = trigger.clone();
                async move {
                    if batch.index() == 0 {
                        trigger.cancel();
                    }
                    Ok::<_, Infallible>(batch.into_items())
                }
            },
            None,
            cancel,
        )
        .await;

    assert_eq!(run.status, RunStatus::Cancelled);
    // the first batch completed; with a cap of 1 nothing else started
    assert_eq!(run.items.len(), 625);
    assert!(run.into_items().is_ok(), "cancellation is not an error");
}

#[tokio::test]
async fn failing_batches_drain_and_keep_partial_output() {
    let metrics = Metrics::new();
    let processor = BatchProcessor::new(BatchOptions {
        batch_size: 0,
        max_parallelism: 4,
    })
    .with_metrics(metrics.clone());

    let run = processor
        .process(
            utils::fleet(2_500),
            |batch: Batch<Vehicle>, _| async move {
                if batch.index() % 2 == 1 {
                    Err(format!("batch {} rejected upstream", batch.index()))
                } else {
                    Ok(batch.into_items())
                }
            },
            None,
            CancellationToken::new(),
        )
        .await;

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.failures.len(), 2);
    assert_eq!(run.items.len(), 1_250);
    assert!(run.into_items().is_err());

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.batches_completed, 2);
    assert_eq!(snapshot.batches_failed, 2);
    assert_eq!(snapshot.items_processed, 1_250);
}
