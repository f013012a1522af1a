//! Error types for the poll watcher.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Errors that can occur in the poll watcher.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Configuration rejected at construction.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The watched root is missing, not a directory, or cannot be listed.
    #[error("path unavailable: {}: {reason}", .path.display())]
    PathUnavailable { path: PathBuf, reason: String },

    /// `start` was called on a running watcher.
    #[error("watcher already started for: {}", .0.display())]
    AlreadyStarted(PathBuf),

    /// `start` was called on a watcher that has been stopped.
    #[error("watcher already stopped for: {}", .0.display())]
    AlreadyStopped(PathBuf),

    /// The polling thread could not be spawned.
    #[error("failed to spawn polling thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The polling thread panicked outside of handler dispatch.
    #[error("polling thread panicked")]
    WorkerPanicked,

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl WatcherError {
    pub(crate) fn path_unavailable(path: &Path, reason: impl Into<String>) -> Self {
        Self::PathUnavailable {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}
