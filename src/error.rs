//! Error types for the clustering engine.

use thiserror::Error;

/// All errors produced by this crate.
#[derive(Error, Debug)]
pub enum MapclustError {
    /// Input validation failed (malformed coordinate, ratio, or configuration).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The manager has been closed; mutations are no longer accepted.
    #[error("cluster engine is closed")]
    EngineClosed,

    /// The recompute worker could not be started.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MapclustError>;
