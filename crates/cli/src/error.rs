use engine_processing::error::ProcessingError;
use live_collections::error::CollectionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Refresh run failed: {0}")]
    Processing(#[from] ProcessingError),

    #[error("Collection update failed: {0}")]
    Collection(#[from] CollectionError),

    #[error("Failed to serialize report to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),
}
