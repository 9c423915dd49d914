//! Transport error types

use std::time::Duration;

use thiserror::Error;

pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The other end went away or the pipe was closed locally
    #[error("Pipe closed")]
    Closed,

    #[error("Frame of {size} bytes exceeds the {limit} byte limit")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}
