//! Centralized error type for the dearjack umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] dearjack_core::Error),

    #[error("Client: {0}")]
    Client(#[from] dearjack_client::Error),

    #[error("Worker: {0}")]
    Worker(#[from] dearjack_worker::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Client '{0}' already exists")]
    ClientExists(String),

    #[error("Unknown client: {0}")]
    UnknownClient(String),

    #[error("Engine is shut down")]
    ShutDown,

    #[error("Background task ended without a result")]
    TaskDropped,
}

pub type Result<T> = std::result::Result<T, Error>;
