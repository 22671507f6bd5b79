//! Adaptive batch sizing.
//!
//! Small inputs get many small batches so work spreads across cores before
//! task overhead dominates; large inputs get fewer, larger batches so
//! scheduling overhead amortizes.

use crate::processor::Batch;

/// Computes the batch size for `total_count` items.
///
/// An explicit `requested_size > 0` wins unmodified. Otherwise the size is
/// chosen by magnitude band, with `available_parallelism` floored at 1
/// before any division.
pub fn chunk_size(total_count: usize, requested_size: usize, available_parallelism: usize) -> usize {
    if requested_size > 0 {
        return requested_size;
    }

    let parallelism = available_parallelism.max(1);
    if total_count <= 1_000 {
        (total_count / (parallelism * 2)).max(10)
    } else if total_count <= 10_000 {
        (total_count / parallelism).max(50)
    } else {
        (total_count / (parallelism / 2).max(1)).max(200)
    }
}

/// Parallelism used when a caller passes 0 for "let the runtime decide".
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Splits `items` into ordered, non-empty batches of at most `size` items.
/// Batch sizes always sum to the input length.
pub fn partition<T>(items: Vec<T>, size: usize) -> Vec<Batch<T>> {
    let size = size.max(1);
    let mut batches = Vec::with_capacity(items.len().div_ceil(size));
    let mut remaining = items.into_iter();

    loop {
        let chunk: Vec<T> = remaining.by_ref().take(size).collect();
        if chunk.is_empty() {
            break;
        }
        batches.push(Batch::new(batches.len(), chunk));
    }
    batches
}
