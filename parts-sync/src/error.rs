//! Error types for parts-sync.

use std::path::PathBuf;

use thiserror::Error;

use parts_core::ConfigError;

/// All errors that can arise from node access and sync operations.
///
/// Node errors are never fatal: callers degrade the affected control to
/// disabled/unchecked or report [`crate::ChangeResult::WriteFailed`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// The node does not exist.
    #[error("node missing: {path}")]
    NodeMissing { path: PathBuf },

    /// The node exists but cannot be opened for reading.
    #[error("node unreadable: {path}")]
    NodeUnreadable { path: PathBuf },

    /// The node exists but cannot be opened for writing.
    #[error("node unwritable: {path}")]
    NodeUnwritable { path: PathBuf },

    /// The node was opened but the write itself failed.
    #[error("write to {path} failed: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Profile or preference store error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// JSON serialization/deserialization error (component store).
    #[error("component store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A start/stop request could not be delivered.
    #[error("service control error: {0}")]
    Service(String),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
