use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CollectionError {
    /// Cancellation was requested before the critical section was entered.
    /// Distinct from a failure: the collection is untouched.
    #[error("operation cancelled before entering the critical section")]
    Cancelled,

    #[error("index {index} out of bounds for collection of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
}
