//! Error types for the coordinator.

use canvas_scene::ValidationError;

/// Errors returned by [`Coordinator::dispatch`](crate::Coordinator::dispatch).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    /// The edit is structurally invalid and was not recorded.
    #[error("edit rejected: {source}")]
    Invalid {
        /// The validation failure.
        #[from]
        source: ValidationError,
    },
}

/// Errors returned by the transaction API.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransactionError {
    /// `begin_transaction` while another transaction is open.
    #[error("a transaction is already open")]
    AlreadyOpen,

    /// `record`, `commit_transaction` or `abort_transaction` with no open
    /// transaction.
    #[error("no transaction is open")]
    NotOpen,

    /// The recorded edit is structurally invalid; the buffer is unchanged.
    #[error("edit rejected: {source}")]
    Invalid {
        /// The validation failure.
        #[from]
        source: ValidationError,
    },
}

/// Two persistence writes that cannot be coalesced: the later one starts
/// past the end of the earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("write at sequence {base} does not continue the pending write ending at {end}")]
pub struct WriteGap {
    /// Sequence just past the earlier write.
    pub end: u64,
    /// Base of the later write.
    pub base: u64,
}
