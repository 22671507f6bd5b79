use crate::error::CliError;
use engine_core::metrics::Metrics;
use engine_processing::{
    chunking,
    processor::{BatchRun, RunStatus},
};
use live_collections::manager::CollectionManager;
use model::fleet::Vehicle;

pub fn print_plan(vehicles: usize, batch_size: usize, parallelism: usize) {
    let parallelism = if parallelism == 0 {
        chunking::default_parallelism()
    } else {
        parallelism
    };
    let size = chunking::chunk_size(vehicles, batch_size, parallelism);
    let batches = vehicles.div_ceil(size.max(1));
    println!("fleet size:     {vehicles}");
    println!("parallelism:    {parallelism}");
    println!("batch size:     {size}");
    println!("batch count:    {batches}");
}

pub fn print_summary(
    run: &BatchRun<Vehicle>,
    manager: &CollectionManager<String, Vehicle>,
    metrics: &Metrics,
) -> Result<(), CliError> {
    let status = match run.status {
        RunStatus::Completed => "completed",
        RunStatus::Cancelled => "cancelled (partial)",
        RunStatus::Failed => "failed (partial)",
    };
    println!(
        "refresh {status}: {}/{} vehicles in {} batches",
        run.processed_items, run.total_items, run.batches
    );

    let mut lines = manager.keys();
    lines.sort();
    for line in lines {
        println!("  line {line}: {} vehicles", manager.collection(&line).len());
    }
    for failure in &run.failures {
        println!("  batch {} failed: {}", failure.batch_index, failure.message);
    }

    println!("{}", serde_json::to_string_pretty(&metrics.snapshot())?);
    Ok(())
}
