//! Append-only event log with undo, redo and checkpoints for the canvas.
//!
//! The log is the only durable truth of a design session: the scene graph is
//! always `replay()` of the active prefix. Undo and redo move a cursor over
//! batches; compaction folds old batches into a checkpoint.
//!
//! # Architecture
//!
//! - [`log`] -- The [`EventLog`] struct: batches, cursor, replay, compaction.
//! - [`snapshot`] -- [`Checkpoint`] and the [`SnapshotPolicy`] that decides
//!   where to cut.
//!
//! # Invariants
//!
//! ```text
//! replay() == reduce_all(checkpoint.state, events[..cursor])
//! ```
//!
//! Appending never rewrites an existing event. The log never panics; it
//! returns errors.

pub mod log;
pub mod snapshot;

pub use log::EventLog;
pub use snapshot::{
    Checkpoint, DEFAULT_RETAIN_UNDO_DEPTH, DEFAULT_SNAPSHOT_THRESHOLD, SnapshotPolicy,
};

/// Errors that can occur during event log operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    /// A truncation cursor lies beyond the stored events.
    #[error("cursor {cursor} is beyond the log length {len}")]
    CursorOutOfRange {
        /// The requested cursor.
        cursor: usize,
        /// Number of stored events.
        len: usize,
    },
}
