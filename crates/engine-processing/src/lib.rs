pub mod chunking;
pub mod error;
pub mod executor;
pub mod processor;
pub mod throttle;
