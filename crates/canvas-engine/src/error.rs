//! Error types for the canvas engine binary.
//!
//! [`EngineError`] wraps every failure mode of a session run so that `main`
//! can propagate with `?`.

/// Top-level error for the canvas engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: canvas_core::ConfigError,
    },

    /// The event store could not be opened, read or written.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: canvas_store::StoreError,
    },

    /// The import file could not be read.
    #[error("failed to read import file {path}: {source}")]
    Import {
        /// The file being imported.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
