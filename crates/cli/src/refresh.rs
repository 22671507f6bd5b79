use crate::{error::CliError, fleet, output};
use engine_core::{metrics::Metrics, progress::BatchProgress};
use engine_processing::{
    processor::{Batch, BatchOptions, BatchProcessor},
    throttle::Throttle,
};
use live_collections::manager::CollectionManager;
use model::fleet::Vehicle;
use std::{collections::HashMap, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

/// Simulated upstream latency per batch.
const FEED_LATENCY: Duration = Duration::from_millis(25);

pub async fn run(
    vehicles: usize,
    batch_size: usize,
    parallelism: usize,
    fail_line: Option<String>,
    progress_interval_ms: u64,
    cancel: CancellationToken,
) -> Result<(), CliError> {
    let run_id = Uuid::new_v4();
    info!(%run_id, vehicles, "starting fleet refresh");

    let metrics = Metrics::new();
    let processor = BatchProcessor::new(BatchOptions {
        batch_size,
        max_parallelism: parallelism,
    })
    .with_metrics(metrics.clone());

    let progress = Throttle::new(
        Duration::from_millis(progress_interval_ms.max(1)),
        |progress: BatchProgress| {
            info!(
                processed = progress.processed_items,
                total = progress.total_items,
                percent = %format!("{:.0}%", progress.percent_complete * 100.0),
                "refresh progress"
            );
        },
    );

    let run = processor
        .process(
            fleet::synthetic_fleet(vehicles),
            move |batch: Batch<Vehicle>, _batch_cancel| {
                let fail_line = fail_line.clone();
                async move {
                    tokio::time::sleep(FEED_LATENCY).await;
                    if let Some(line) = &fail_line
                        && batch.items().iter().any(|v| v.line == *line)
                    {
                        return Err(format!("feed for line {line} unavailable"));
                    }
                    Ok(batch
                        .into_items()
                        .into_iter()
                        .map(fleet::normalize)
                        .collect::<Vec<_>>())
                }
            },
            Some(progress.into_progress_callback()),
            cancel,
        )
        .await;

    // Partial aggregates from a cancelled or failed run are still worth
    // publishing, so storage runs under its own token.
    let store_token = CancellationToken::new();
    let manager: CollectionManager<String, Vehicle> = CollectionManager::new();
    let mut by_line: HashMap<String, Vec<Vehicle>> = HashMap::new();
    for vehicle in &run.items {
        by_line.entry(vehicle.line.clone()).or_default().push(vehicle.clone());
    }
    for (line, line_vehicles) in by_line {
        manager.update(&line, line_vehicles, false, &store_token).await?;
    }

    output::print_summary(&run, &manager, &metrics)?;

    run.into_items()?;
    Ok(())
}
