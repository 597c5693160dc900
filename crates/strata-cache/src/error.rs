//! Error types.

use thiserror::Error;

/// Error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Core error (config, span, source).
    #[error(transparent)]
    Core(#[from] strata_core::Error),

    /// IO error on a cache file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The cache file was deleted while a stake still referenced it.
    #[error("Cache file closed: {0}")]
    FileClosed(String),

    /// The trail has been disposed.
    #[error("Decimated trail disposed")]
    Disposed,

    /// Output buffer does not match the decimated layout.
    #[error("Buffer too small: need {channels} channels x {frames} frames")]
    BufferTooSmall { channels: usize, frames: usize },

    /// Background rebuild thread could not be started.
    #[error("Rebuild error: {0}")]
    Rebuild(String),
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;
