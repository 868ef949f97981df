//! Error types for the remixing engine

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a remix run
#[derive(Error, Debug)]
pub enum RemixError {
    #[error("Failed to allocate {what} buffer of {len} samples")]
    AllocationFailure { what: &'static str, len: usize },
    #[error("Processing of audio with {count} channels is not supported (1-6 channels)")]
    UnsupportedChannelCount { count: usize },
    #[error("Transform size {size} is invalid")]
    InvalidTransformSize { size: usize },
    #[error("'{}': {message}", path.display())]
    Io { path: PathBuf, message: String },
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Audio device error: {0}")]
    Device(String),
}

impl RemixError {
    /// Build an I/O error naming the failing path
    pub fn io(path: impl Into<PathBuf>, err: impl ToString) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Result alias used across the engine
pub type Result<T> = std::result::Result<T, RemixError>;
