//! Error types for strata-core.

use thiserror::Error;

/// Error type for strata-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid span: start={start}, stop={stop}")]
    InvalidSpan { start: u64, stop: u64 },

    #[error("Span {start}..{stop} exceeds source length {len}")]
    OutOfRange { start: u64, stop: u64, len: u64 },

    #[error("Channel mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    #[error("Source error: {0}")]
    Source(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for strata-core operations.
pub type Result<T> = std::result::Result<T, Error>;
