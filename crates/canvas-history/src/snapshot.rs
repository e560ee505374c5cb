//! Checkpoints: a folded prefix of the log that replaces its events.
//!
//! A [`Checkpoint`] holds the [`DesignState`] produced by the first
//! `sequence` events ever appended. Replay starts from it instead of from an
//! empty state, which bounds both memory and replay time for long sessions.
//! The price is that undo cannot reach behind a checkpoint.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use canvas_scene::DesignState;

/// Default number of active events before compaction kicks in.
pub const DEFAULT_SNAPSHOT_THRESHOLD: usize = 10_000;

/// Default undo depth (in events) kept behind the cursor after compaction.
pub const DEFAULT_RETAIN_UNDO_DEPTH: usize = 1_000;

/// A folded prefix of the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// State after folding the first `sequence` events.
    pub state: DesignState,
    /// Number of events folded into `state` since the log began.
    pub sequence: u64,
    /// Unix timestamp in milliseconds when the checkpoint was taken.
    #[serde(default)]
    pub taken_at: i64,
}

impl Checkpoint {
    /// Wrap a folded state.
    pub fn new(state: DesignState, sequence: u64) -> Self {
        Self {
            state,
            sequence,
            taken_at: Utc::now().timestamp_millis(),
        }
    }
}

/// When and how far to compact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotPolicy {
    /// Compact once the active log holds more than this many events.
    pub threshold: usize,
    /// Keep at least this many events of undo depth behind the cursor.
    pub retain: usize,
}

impl Default for SnapshotPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SNAPSHOT_THRESHOLD,
            retain: DEFAULT_RETAIN_UNDO_DEPTH,
        }
    }
}

impl SnapshotPolicy {
    /// Choose how many leading events to fold.
    ///
    /// `batch_ends` are the exclusive end offsets of every batch, ascending;
    /// `cursor` is the number of active events. The cut always lands on a
    /// batch boundary so that no transaction is split, and leaves at least
    /// `retain` events before the cursor. Returns `None` when nothing should
    /// be folded.
    pub fn plan_cut(&self, batch_ends: &[usize], cursor: usize) -> Option<usize> {
        if cursor <= self.threshold {
            return None;
        }
        let limit = cursor.checked_sub(self.retain)?;
        batch_ends
            .iter()
            .copied()
            .take_while(|end| *end <= limit)
            .last()
            .filter(|cut| *cut > 0)
    }
}
