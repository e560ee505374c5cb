//! The transaction buffer behind `begin` / `record` / `commit`.
//!
//! A [`Transaction`] collects stamped events for one user gesture. Nothing
//! in it is visible to the shared state until commit, when the whole buffer
//! is appended to the log as a single batch and folded once.

use chrono::{DateTime, Utc};

use canvas_scene::{DesignState, PendingScope};
use canvas_types::Event;

/// An open transaction.
#[derive(Debug, Clone)]
pub struct Transaction {
    events: Vec<Event>,
    scope: PendingScope,
    opened_at: DateTime<Utc>,
}

impl Transaction {
    /// Open an empty transaction.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            scope: PendingScope::new(),
            opened_at: Utc::now(),
        }
    }

    /// Buffer an event already validated against `state` and the scope.
    /// No fold.
    pub fn push(&mut self, state: &DesignState, event: Event) {
        self.scope.record(state, &event.payload);
        self.events.push(event);
    }

    /// Structural edits buffered so far, for validating later records.
    pub const fn scope(&self) -> &PendingScope {
        &self.scope
    }

    /// Buffered events in record order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Number of buffered events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// When the transaction was opened.
    pub const fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Consume the transaction, yielding its events.
    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    /// Whether any buffered payload touches geometry or hierarchy.
    pub fn affects_transforms(&self) -> bool {
        self.events
            .iter()
            .any(|e| e.kind().affects_transforms())
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}
