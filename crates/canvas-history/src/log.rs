//! The event log: an append-only sequence of batches with a cursor.
//!
//! The [`EventLog`] is the in-memory source of truth for an editing session.
//! Events are grouped into batches; one batch is one undo step, so a
//! committed transaction of many events undoes as a unit.
//!
//! # Design
//!
//! - **Append-only**: events are never modified. Appending while undone
//!   truncates the redo branch first.
//! - **Cursor**: the active prefix is every batch before the cursor. Undo
//!   and redo only move the cursor; they never create events.
//! - **Checkpoint**: compaction folds the oldest batches into a
//!   [`Checkpoint`]; replay starts from it. Undo cannot cross it.
//! - **Deterministic**: [`EventLog::replay`] is a pure fold of the active
//!   prefix onto the checkpoint state.

use core::ops::Range;

use tracing::{debug, info};

use canvas_scene::{DesignState, reduce_all};
use canvas_types::Event;

use crate::HistoryError;
use crate::snapshot::{Checkpoint, SnapshotPolicy};

/// Append-only event log with batch-granular undo and redo.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    /// Folded prefix, if compaction has run.
    checkpoint: Option<Checkpoint>,
    /// Events after the checkpoint, including the redo branch.
    events: Vec<Event>,
    /// Exclusive end offset into `events` of every batch, ascending.
    batch_ends: Vec<usize>,
    /// Number of batches in the active prefix.
    active_batches: usize,
}

impl EventLog {
    /// Create an empty log.
    pub const fn new() -> Self {
        Self {
            checkpoint: None,
            events: Vec::new(),
            batch_ends: Vec::new(),
            active_batches: 0,
        }
    }

    /// Rebuild a log from persisted storage.
    ///
    /// `events` is the full persisted log; the first `checkpoint.sequence`
    /// of them are already folded into the checkpoint and are skipped.
    /// Batch boundaries are not persisted, so every restored event becomes
    /// its own undo step.
    pub fn from_parts(checkpoint: Option<Checkpoint>, events: Vec<Event>) -> Self {
        let skip = checkpoint
            .as_ref()
            .map_or(0, |c| usize::try_from(c.sequence).unwrap_or(usize::MAX));
        let events: Vec<Event> = events.into_iter().skip(skip).collect();
        let batch_ends: Vec<usize> = (1..=events.len()).collect();
        let active_batches = batch_ends.len();
        info!(
            checkpoint_sequence = checkpoint.as_ref().map_or(0, |c| c.sequence),
            restored_events = events.len(),
            "event log restored"
        );
        Self {
            checkpoint,
            events,
            batch_ends,
            active_batches,
        }
    }

    // -------------------------------------------------------------------
    // Appending
    // -------------------------------------------------------------------

    /// Append one event as its own undo step. Returns its index range.
    pub fn append(&mut self, event: Event) -> Range<usize> {
        self.append_batch(vec![event])
    }

    /// Append events as a single undo step, truncating the redo branch
    /// first. Returns the index range of the new batch; an empty input
    /// appends nothing and returns an empty range.
    pub fn append_batch(&mut self, events: Vec<Event>) -> Range<usize> {
        let start = self.cursor();
        if self.can_redo() {
            self.drop_redo_branch();
        }
        if events.is_empty() {
            return start..start;
        }
        self.events.extend(events);
        let end = self.events.len();
        self.batch_ends.push(end);
        self.active_batches = self.batch_ends.len();
        start..end
    }

    /// Discard every event at and beyond `cursor`.
    ///
    /// A batch cut in the middle keeps its surviving prefix as a shorter
    /// batch. Returns the number of events dropped.
    pub fn truncate_after(&mut self, cursor: usize) -> Result<usize, HistoryError> {
        let len = self.events.len();
        if cursor > len {
            return Err(HistoryError::CursorOutOfRange { cursor, len });
        }
        self.events.truncate(cursor);
        self.batch_ends.retain(|end| *end <= cursor);
        if self.batch_ends.last().copied().unwrap_or(0) < cursor {
            self.batch_ends.push(cursor);
        }
        self.active_batches = self.active_batches.min(self.batch_ends.len());
        Ok(len.saturating_sub(cursor))
    }

    fn drop_redo_branch(&mut self) {
        let cursor = self.cursor();
        let dropped = self.events.len().saturating_sub(cursor);
        self.events.truncate(cursor);
        self.batch_ends.truncate(self.active_batches);
        debug!(dropped, "redo branch discarded");
    }

    // -------------------------------------------------------------------
    // Undo / redo
    // -------------------------------------------------------------------

    /// Step back one batch. Returns the range of events that left the
    /// active prefix.
    pub fn undo(&mut self) -> Option<Range<usize>> {
        let last = self.active_batches.checked_sub(1)?;
        let range = self.batch_range(last)?;
        self.active_batches = last;
        Some(range)
    }

    /// Step forward one batch. Returns the range of events that re-entered
    /// the active prefix.
    pub fn redo(&mut self) -> Option<Range<usize>> {
        let range = self.batch_range(self.active_batches)?;
        self.active_batches = self.active_batches.saturating_add(1);
        Some(range)
    }

    /// Whether there is a batch to undo.
    pub const fn can_undo(&self) -> bool {
        self.active_batches > 0
    }

    /// Whether there is a batch to redo.
    pub fn can_redo(&self) -> bool {
        self.active_batches < self.batch_ends.len()
    }

    fn batch_range(&self, index: usize) -> Option<Range<usize>> {
        let end = *self.batch_ends.get(index)?;
        let start = index
            .checked_sub(1)
            .and_then(|prev| self.batch_ends.get(prev).copied())
            .unwrap_or(0);
        Some(start..end)
    }

    // -------------------------------------------------------------------
    // Compaction and replay
    // -------------------------------------------------------------------

    /// Fold the oldest batches into the checkpoint when the active log holds
    /// more than `threshold` events, keeping at least `retain` events of
    /// undo depth. Returns the number of events folded.
    pub fn snapshot(&mut self, threshold: usize, retain: usize) -> Option<usize> {
        let policy = SnapshotPolicy { threshold, retain };
        let active_ends = self.batch_ends.get(..self.active_batches)?;
        let cut = policy.plan_cut(active_ends, self.cursor())?;

        let base = self.checkpoint_state();
        let state = reduce_all(base, self.events.get(..cut)?);
        let sequence = self
            .base_sequence()
            .saturating_add(u64::try_from(cut).unwrap_or(u64::MAX));

        self.events.drain(..cut);
        let folded_batches = self.batch_ends.iter().take_while(|end| **end <= cut).count();
        self.batch_ends.drain(..folded_batches);
        for end in &mut self.batch_ends {
            *end = end.saturating_sub(cut);
        }
        self.active_batches = self.active_batches.saturating_sub(folded_batches);
        self.checkpoint = Some(Checkpoint::new(state, sequence));

        info!(folded = cut, sequence, remaining = self.events.len(), "event log compacted");
        Some(cut)
    }

    /// Fold the active prefix onto the checkpoint state.
    pub fn replay(&self) -> DesignState {
        reduce_all(self.checkpoint_state(), self.active_events())
    }

    fn checkpoint_state(&self) -> DesignState {
        self.checkpoint
            .as_ref()
            .map_or_else(DesignState::new, |c| c.state.clone())
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    /// Events in the active prefix.
    pub fn active_events(&self) -> &[Event] {
        self.events.get(..self.cursor()).unwrap_or_default()
    }

    /// Events in an index range; empty when out of bounds.
    pub fn events_in(&self, range: Range<usize>) -> &[Event] {
        self.events.get(range).unwrap_or_default()
    }

    /// Every stored event after the checkpoint, redo branch included.
    pub fn all_events(&self) -> &[Event] {
        &self.events
    }

    /// Number of stored events after the checkpoint.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events are stored after the checkpoint.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events in the active prefix.
    pub fn cursor(&self) -> usize {
        self.active_batches
            .checked_sub(1)
            .and_then(|last| self.batch_ends.get(last).copied())
            .unwrap_or(0)
    }

    /// Number of undo steps available.
    pub const fn undo_depth(&self) -> usize {
        self.active_batches
    }

    /// Number of batches stored after the checkpoint.
    pub fn batch_count(&self) -> usize {
        self.batch_ends.len()
    }

    /// The current checkpoint, if any.
    pub const fn checkpoint(&self) -> Option<&Checkpoint> {
        self.checkpoint.as_ref()
    }

    /// Number of events folded into the checkpoint.
    pub fn base_sequence(&self) -> u64 {
        self.checkpoint.as_ref().map_or(0, |c| c.sequence)
    }

    /// Global sequence number of the cursor: checkpointed events plus the
    /// active prefix.
    pub fn sequence(&self) -> u64 {
        self.base_sequence()
            .saturating_add(u64::try_from(self.cursor()).unwrap_or(u64::MAX))
    }
}
