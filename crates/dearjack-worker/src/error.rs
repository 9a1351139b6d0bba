//! Error types for dearjack-worker.

use thiserror::Error;

/// Error type for worker pool operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Worker pool is shut down")]
    ShutDown,

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Worker pool needs at least one thread")]
    InvalidSize,
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
