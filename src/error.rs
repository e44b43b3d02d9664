//! Error types for forkpool.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for forkpool.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Timed out after {waited:?} connecting to {}", path.display())]
    ConnectTimeout { path: PathBuf, waited: Duration },

    #[error("Failed to spawn worker for unit {unit}: {source}")]
    Spawn {
        unit: usize,
        #[source]
        source: nix::errno::Errno,
    },

    #[error("All {0} workers failed to spawn")]
    SpawnExhausted(usize),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for forkpool operations.
pub type Result<T> = std::result::Result<T, PoolError>;
