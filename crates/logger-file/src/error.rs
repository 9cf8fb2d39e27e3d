//! Error types for file-based logging

use std::io;
use std::path::PathBuf;

/// Result type for file logger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during file logging
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failed to create log directory
    #[error("Failed to create log directory at {path}: {source}")]
    CreateDirectory {
        /// The path that failed to be created
        path: PathBuf,
        /// The underlying error
        source: io::Error,
    },

    /// Failed to move the active file to its backup name
    #[error("Failed to rotate {from} to {to}: {source}")]
    Rotation {
        /// The active log file
        from: PathBuf,
        /// The backup name
        to: PathBuf,
        /// The underlying error
        source: io::Error,
    },

    /// Failed to open the active log file
    #[error("Failed to open log file {path}: {source}")]
    Open {
        /// The log file
        path: PathBuf,
        /// The underlying error
        source: io::Error,
    },

    /// The writer was closed
    #[error("Log writer is closed")]
    Closed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<Error> for io::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::Io(error) => error,
            other => Self::other(other),
        }
    }
}
