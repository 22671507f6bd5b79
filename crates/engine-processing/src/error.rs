use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("{failed} of {batches} batches failed; first: {first}")]
    BatchFailed {
        failed: usize,
        batches: usize,
        first: String,
    },
}

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("{failed} worker(s) failed, {completed} completed; first: {first}")]
    WorkerFailed {
        failed: usize,
        completed: usize,
        first: String,
    },
}
