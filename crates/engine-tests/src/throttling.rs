//! Throttle behavior under bursty progress reporting.

use crate::utils;
use engine_core::progress::BatchProgress;
use engine_processing::{
    processor::{Batch, BatchOptions, BatchProcessor, RunStatus},
    throttle::Throttle,
};
use model::fleet::Vehicle;
use std::{
    convert::Infallible,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::time::advance;
use tokio_util::sync::CancellationToken;

#[tokio::test(start_paused = true)]
async fn burst_of_a_thousand_calls_yields_two_deliveries() {
    let seen: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let throttle = Throttle::new(Duration::from_millis(250), move |value| {
        sink.lock().unwrap().push(value)
    });

    for value in 1..=1_000u64 {
        throttle.call(value);
    }
    tokio::task::yield_now().await;
    advance(Duration::from_millis(250)).await;
    tokio::task::yield_now().await;

    let delivered = seen.lock().unwrap();
    assert_eq!(delivered.len(), 2, "leading plus one trailing delivery");
    assert_eq!(delivered[0], 1);
    assert_eq!(delivered[1], 1_000, "trailing carries the most recent value");
}

#[tokio::test]
async fn throttled_progress_still_sees_the_final_snapshot() {
    let seen: Arc<Mutex<Vec<BatchProgress>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let throttle = Throttle::new(Duration::from_millis(50), move |progress| {
        sink.lock().unwrap().push(progress)
    });

    let processor = BatchProcessor::new(BatchOptions {
        batch_size: 100,
        max_parallelism: 2,
    });
    let run = processor
        .process(
            utils::fleet(1_000),
            |batch: Batch<Vehicle>, _| async move { Ok::<_, Infallible>(batch.into_items()) },
            Some(throttle.into_progress_callback()),
            CancellationToken::new(),
        )
        .await;
    assert_eq!(run.status, RunStatus::Completed);

    // wait out one interval so the trailing delivery lands
    tokio::time::sleep(Duration::from_millis(120)).await;

    let delivered = seen.lock().unwrap();
    assert!(
        !delivered.is_empty() && delivered.len() <= 12,
        "bursty snapshots must be paced, got {}",
        delivered.len()
    );
    let last = delivered.last().unwrap();
    assert_eq!(last.processed_items, 1_000);
    assert_eq!(last.percent_complete, 1.0);
}
