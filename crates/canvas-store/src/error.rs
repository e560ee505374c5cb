//! Error types for the storage layer.
//!
//! All errors are propagated via [`StoreError`], which wraps the underlying
//! I/O and serialization errors with the path or line that failed.

use std::path::PathBuf;

/// Errors that can occur in the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A filesystem operation failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend refused the write (used by in-memory fault injection).
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Attach a path to an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
