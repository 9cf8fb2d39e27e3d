//! Error types for the logging core

use std::io;

/// Result type for logger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the logging core
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Writing to the sink failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A configuration value is structurally invalid
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The dispatcher worker thread could not be spawned
    #[error("Failed to spawn dispatcher thread: {0}")]
    Spawn(#[source] io::Error),

    /// The dispatcher was stopped while an entry was being handed to it
    #[error("Dispatcher stopped: entry could not be queued")]
    DispatcherStopped,
}
