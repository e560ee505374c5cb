//! Durable event and checkpoint storage for the canvas.
//!
//! Persistence is the only asynchronous boundary of the editor. The
//! [`EventStore`] trait is what the coordinator flushes into; it never reads
//! in-memory state directly.
//!
//! # Backends
//!
//! - [`MemoryStore`] -- In-process store for tests and ephemeral sessions,
//!   with write-failure injection.
//! - [`FileStore`] -- JSON lines event log plus a JSON checkpoint file,
//!   written through `tokio::fs`.
//!
//! # Contract
//!
//! - `append` adds events after everything already stored.
//! - `truncate(len)` drops stored events beyond `len` (undo followed by a
//!   new edit rewrites history).
//! - `load_all` returns every stored event in order. Malformed records are
//!   skipped with a warning, never fatal.
//! - A checkpoint covers the first `sequence` stored events.

pub mod error;
pub mod file;
pub mod memory;

use async_trait::async_trait;

use canvas_history::Checkpoint;
use canvas_types::Event;

pub use error::StoreError;
pub use file::FileStore;
pub use memory::MemoryStore;

/// Durable storage for the event log.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append events after everything already stored.
    async fn append(&self, events: &[Event]) -> Result<(), StoreError>;

    /// Drop stored events beyond the first `len`. No-op when fewer are
    /// stored.
    async fn truncate(&self, len: u64) -> Result<(), StoreError>;

    /// Every stored event, in append order.
    async fn load_all(&self) -> Result<Vec<Event>, StoreError>;

    /// Replace the stored checkpoint.
    async fn snapshot(&self, checkpoint: &Checkpoint) -> Result<(), StoreError>;

    /// The stored checkpoint, if any.
    async fn load_snapshot(&self) -> Result<Option<Checkpoint>, StoreError>;
}
