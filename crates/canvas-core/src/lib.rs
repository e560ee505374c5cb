//! Transaction coordinator, persistence queue and configuration for the
//! canvas.
//!
//! This crate is the single writer of a design session. The host talks to
//! one [`Coordinator`]; everything below it (log, scene graph, transform
//! cache) is owned and never shared mutably.
//!
//! # Architecture
//!
//! - [`config`] -- [`CanvasConfig`], loaded from YAML with env overrides.
//! - [`coordinator`] -- The [`Coordinator`]: dispatch, transactions, undo,
//!   redo, geometry queries, flushing.
//! - [`transaction`] -- The buffer behind `begin` / `record` / `commit`.
//! - [`persist`] -- The debounced, coalescing [`PersistQueue`].
//! - [`subscription`] -- Change listeners notified once per commit.
//! - [`error`] -- [`DispatchError`] and [`TransactionError`].
//!
//! # Commit pipeline
//!
//! ```text
//! record* -> commit -> append batch -> fold once -> invalidate once
//!                                   -> enqueue write -> notify once
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod persist;
pub mod subscription;
pub mod transaction;

pub use config::{CanvasConfig, ConfigError};
pub use coordinator::{CommitReport, Coordinator, CoordinatorStats, DispatchOutcome};
pub use error::{DispatchError, TransactionError, WriteGap};
pub use persist::{PendingWrite, PersistQueue};
pub use subscription::{Change, ChangeKind, ChangeListener, SubscriptionId, Subscribers};
pub use transaction::Transaction;
