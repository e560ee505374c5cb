//! The transaction coordinator: the single owner of all mutable editor
//! state.
//!
//! [`Coordinator`] owns the [`EventLog`], the derived [`DesignState`], the
//! [`TransformCache`], the persistence queue and the subscribers. Nothing
//! else can write any of them, so every change flows through one of:
//!
//! - [`Coordinator::dispatch`] -- one validated edit, one fold.
//! - [`Coordinator::commit_transaction`] -- a buffered gesture, one fold.
//! - [`Coordinator::undo`] / [`Coordinator::redo`] -- cursor moves.
//!
//! Each of those performs exactly one fold, one cache invalidation pass, one
//! scheduled write and one notification.

use serde::Serialize;
use tracing::{debug, info, warn};

use canvas_history::{Checkpoint, EventLog};
use canvas_scene::{
    DesignState, Effects, GroupMoveGesture, GroupResizeGesture, GroupRotateGesture, TransformCache,
    absolute_to_relative, centroid, fold, screen_delta_to_local, validate, validate_in_scope,
};
use canvas_store::{EventStore, StoreError};
use canvas_types::{ElementId, Event, EventPayload, Point, Transform};

use crate::config::CanvasConfig;
use crate::error::{DispatchError, TransactionError};
use crate::persist::{PendingWrite, PersistQueue};
use crate::subscription::{Change, ChangeKind, ChangeListener, SubscriptionId, Subscribers};
use crate::transaction::Transaction;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Counters proving the one-fold-per-commit guarantee.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    /// Number of fold passes over the log (incremental or full).
    pub fold_count: u64,
    /// Total events passed through the reducer.
    pub events_folded: u64,
    /// Full replays from the checkpoint (restore and undo).
    pub replays: u64,
    /// Non-empty commits, dispatches included.
    pub commits: u64,
    /// Aborted transactions.
    pub aborts: u64,
}

/// Outcome of one fold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitReport {
    /// Events appended to the log.
    pub events: usize,
    /// Events that changed the state.
    pub applied: usize,
    /// Events the reducer turned into no-ops.
    pub skipped: usize,
    /// Elements whose transform subtree was invalidated.
    pub moved: usize,
    /// Elements removed.
    pub removed: usize,
    /// Global log sequence after the commit.
    pub sequence: u64,
}

impl CommitReport {
    fn from_effects(events: usize, effects: &Effects, sequence: u64) -> Self {
        Self {
            events,
            applied: effects.applied,
            skipped: effects.skipped,
            moved: effects.moved.len(),
            removed: effects.removed.len(),
            sequence,
        }
    }
}

/// Outcome of [`Coordinator::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Applied immediately as its own undo step.
    Applied(CommitReport),
    /// Buffered into the open transaction.
    Recorded {
        /// Events now buffered.
        buffered: usize,
    },
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Owner of the log, the scene graph and everything derived from them.
#[derive(Debug)]
pub struct Coordinator {
    config: CanvasConfig,
    log: EventLog,
    state: DesignState,
    cache: TransformCache,
    transaction: Option<Transaction>,
    persist: PersistQueue,
    /// Stored event count after the last successful flush, when known.
    durable_len: Option<u64>,
    subscribers: Subscribers,
    stats: CoordinatorStats,
}

impl Coordinator {
    /// Start an empty session.
    pub fn new(config: CanvasConfig) -> Self {
        let cache = TransformCache::new(config.transform.max_depth);
        let persist = PersistQueue::new(config.persistence.flush_interval_ms);
        Self {
            config,
            log: EventLog::new(),
            state: DesignState::new(),
            cache,
            transaction: None,
            persist,
            durable_len: None,
            subscribers: Subscribers::default(),
            stats: CoordinatorStats::default(),
        }
    }

    /// Rebuild a session from persisted data: the latest checkpoint and the
    /// full stored event log.
    pub fn from_store(
        config: CanvasConfig,
        checkpoint: Option<Checkpoint>,
        events: Vec<Event>,
    ) -> Self {
        let stored = u64::try_from(events.len()).unwrap_or(u64::MAX);
        let mut coordinator = Self::new(config);
        coordinator.log = EventLog::from_parts(checkpoint, events);
        coordinator.state = coordinator.log.replay();
        coordinator.durable_len = Some(stored);
        coordinator.stats.fold_count = 1;
        coordinator.stats.events_folded = count(coordinator.log.cursor());
        coordinator.stats.replays = 1;
        info!(
            sequence = coordinator.log.sequence(),
            elements = coordinator.state.element_count(),
            pages = coordinator.state.page_count(),
            "session restored"
        );
        coordinator
    }

    /// Load a session from a store.
    pub async fn load<S>(config: CanvasConfig, store: &S) -> Result<Self, StoreError>
    where
        S: EventStore + ?Sized,
    {
        let checkpoint = store.load_snapshot().await?;
        let events = store.load_all().await?;
        Ok(Self::from_store(config, checkpoint, events))
    }

    // -------------------------------------------------------------------
    // Editing
    // -------------------------------------------------------------------

    /// Validate and apply one edit.
    ///
    /// Inside an open transaction the edit is buffered instead, exactly as
    /// [`record`](Self::record) would.
    pub fn dispatch(&mut self, payload: EventPayload) -> Result<DispatchOutcome, DispatchError> {
        if let Some(tx) = self.transaction.as_mut() {
            buffer(tx, &self.state, &self.config, payload)?;
            return Ok(DispatchOutcome::Recorded { buffered: tx.len() });
        }
        validate(&self.state, &payload, self.config.transform.max_depth)?;
        let event = stamp(&self.config, payload);
        let report = self.commit_events(vec![event], ChangeKind::Dispatch);
        Ok(DispatchOutcome::Applied(report))
    }

    /// Open a transaction buffer.
    pub fn begin_transaction(&mut self) -> Result<(), TransactionError> {
        if self.transaction.is_some() {
            return Err(TransactionError::AlreadyOpen);
        }
        self.transaction = Some(Transaction::new());
        debug!("transaction opened");
        Ok(())
    }

    /// Validate an edit against live state plus earlier buffered creations
    /// and append it to the open buffer. No fold, no write.
    ///
    /// Returns the number of buffered events.
    pub fn record(&mut self, payload: EventPayload) -> Result<usize, TransactionError> {
        let tx = self
            .transaction
            .as_mut()
            .ok_or(TransactionError::NotOpen)?;
        buffer(tx, &self.state, &self.config, payload)?;
        Ok(tx.len())
    }

    /// Append the buffer as one undo step and fold it once.
    ///
    /// An empty transaction commits nothing: no log entry, no write, no
    /// notification.
    pub fn commit_transaction(&mut self) -> Result<CommitReport, TransactionError> {
        let tx = self.transaction.take().ok_or(TransactionError::NotOpen)?;
        if tx.is_empty() {
            debug!("empty transaction committed");
            return Ok(CommitReport {
                sequence: self.log.sequence(),
                ..CommitReport::default()
            });
        }
        let elapsed_ms = chrono::Utc::now()
            .signed_duration_since(tx.opened_at())
            .num_milliseconds();
        let report = self.commit_events(tx.into_events(), ChangeKind::Commit);
        debug!(
            events = report.events,
            moved = report.moved,
            elapsed_ms,
            "transaction committed"
        );
        Ok(report)
    }

    /// Drop the buffer without touching shared state. Returns the number of
    /// discarded events.
    pub fn abort_transaction(&mut self) -> Result<usize, TransactionError> {
        let tx = self.transaction.take().ok_or(TransactionError::NotOpen)?;
        self.stats.aborts = self.stats.aborts.saturating_add(1);
        debug!(discarded = tx.len(), "transaction aborted");
        Ok(tx.len())
    }

    /// Whether a transaction is open.
    pub const fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// The open transaction, if any.
    pub const fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }

    fn commit_events(&mut self, events: Vec<Event>, kind: ChangeKind) -> CommitReport {
        let base = self.log.sequence();
        let range = self.log.append_batch(events);
        let appended = self.log.events_in(range).to_vec();

        let effects = fold(&mut self.state, &appended);
        self.cache.apply_effects(&self.state, &effects);
        let report = CommitReport::from_effects(appended.len(), &effects, self.log.sequence());
        self.enqueue_write(base, appended);

        self.stats.fold_count = self.stats.fold_count.saturating_add(1);
        self.stats.events_folded = self.stats.events_folded.saturating_add(count(report.events));
        self.stats.commits = self.stats.commits.saturating_add(1);
        self.notify(kind, report.events);
        report
    }

    // -------------------------------------------------------------------
    // History
    // -------------------------------------------------------------------

    /// Step back one undo step.
    ///
    /// Rebuilds the state by replaying the active prefix from the
    /// checkpoint and clears the transform cache. Returns the number of
    /// events undone, or `None` at the start of history.
    pub fn undo(&mut self) -> Result<Option<usize>, TransactionError> {
        if self.transaction.is_some() {
            return Err(TransactionError::AlreadyOpen);
        }
        let Some(range) = self.log.undo() else {
            return Ok(None);
        };
        let undone = range.len();

        let selection = self.state.selection().clone();
        self.state = self.log.replay();
        self.state.set_selection(selection);
        self.cache.clear();
        self.enqueue_write(self.log.sequence(), Vec::new());

        self.stats.fold_count = self.stats.fold_count.saturating_add(1);
        self.stats.events_folded = self
            .stats
            .events_folded
            .saturating_add(count(self.log.cursor()));
        self.stats.replays = self.stats.replays.saturating_add(1);
        debug!(undone, sequence = self.log.sequence(), "undo");
        self.notify(ChangeKind::Undo, undone);
        Ok(Some(undone))
    }

    /// Re-apply the next undone step, folding only its events.
    pub fn redo(&mut self) -> Result<Option<usize>, TransactionError> {
        if self.transaction.is_some() {
            return Err(TransactionError::AlreadyOpen);
        }
        let base = self.log.sequence();
        let Some(range) = self.log.redo() else {
            return Ok(None);
        };
        let redone = self.log.events_in(range).to_vec();

        let effects = fold(&mut self.state, &redone);
        self.cache.apply_effects(&self.state, &effects);
        let events = redone.len();
        self.enqueue_write(base, redone);

        self.stats.fold_count = self.stats.fold_count.saturating_add(1);
        self.stats.events_folded = self.stats.events_folded.saturating_add(count(events));
        debug!(redone = events, sequence = self.log.sequence(), "redo");
        self.notify(ChangeKind::Redo, events);
        Ok(Some(events))
    }

    /// Whether an undo step is available.
    pub const fn can_undo(&self) -> bool {
        self.log.can_undo()
    }

    /// Whether a redo step is available.
    pub fn can_redo(&self) -> bool {
        self.log.can_redo()
    }

    /// Fold old history into a checkpoint per the configured thresholds.
    /// Returns the number of events folded.
    pub fn compact(&mut self) -> Option<usize> {
        self.log.snapshot(
            self.config.history.snapshot_threshold,
            self.config.history.retain_undo_depth,
        )
    }

    // -------------------------------------------------------------------
    // Geometry
    // -------------------------------------------------------------------

    /// Absolute (page-space) transform of an element.
    pub fn absolute_transform(&mut self, id: ElementId) -> Option<Transform> {
        self.cache.get(&self.state, id)
    }

    /// Local `(position, rotation)` placing an element at `absolute` under
    /// `parent`.
    pub fn absolute_to_relative(
        &mut self,
        absolute: Transform,
        parent: Option<ElementId>,
    ) -> Option<(Point, f64)> {
        absolute_to_relative(&mut self.cache, &self.state, absolute, parent)
    }

    /// A screen-space drag delta expressed in the element's parent frame.
    pub fn screen_delta_to_local(&mut self, id: ElementId, delta: Point) -> Option<Point> {
        screen_delta_to_local(&mut self.cache, &self.state, id, delta)
    }

    /// Start a move gesture over the current selection.
    pub fn begin_group_move(&mut self) -> GroupMoveGesture {
        let ids = self.selected_ids();
        GroupMoveGesture::begin(&self.state, &mut self.cache, &ids)
    }

    /// Start a rotation gesture over the current selection, about `pivot`
    /// or the selection centre.
    pub fn begin_group_rotate(&mut self, pivot: Option<Point>) -> GroupRotateGesture {
        let ids = self.selected_ids();
        let pivot = pivot
            .or_else(|| centroid(&self.state, &mut self.cache, &ids))
            .unwrap_or(Point::ZERO);
        GroupRotateGesture::begin(&self.state, &mut self.cache, &ids, pivot)
    }

    /// Start a resize gesture over the current selection, scaling away from
    /// `anchor`.
    pub fn begin_group_resize(&mut self, anchor: Point) -> GroupResizeGesture {
        let ids = self.selected_ids();
        GroupResizeGesture::begin(&self.state, &mut self.cache, &ids, anchor)
    }

    fn selected_ids(&self) -> Vec<ElementId> {
        self.state.selection().iter().copied().collect()
    }

    // -------------------------------------------------------------------
    // Selection
    // -------------------------------------------------------------------

    /// Replace the selection. Unknown ids are dropped.
    pub fn select<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = ElementId>,
    {
        self.state.set_selection(ids);
        self.notify(ChangeKind::Selection, 0);
    }

    /// Empty the selection.
    pub fn clear_selection(&mut self) {
        self.select(core::iter::empty());
    }

    // -------------------------------------------------------------------
    // Subscribers
    // -------------------------------------------------------------------

    /// Register a change listener.
    pub fn subscribe<L>(&mut self, listener: L) -> SubscriptionId
    where
        L: ChangeListener + 'static,
    {
        self.subscribers.subscribe(Box::new(listener))
    }

    /// Remove a change listener. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    fn notify(&mut self, kind: ChangeKind, events: usize) {
        let change = Change {
            kind,
            sequence: self.log.sequence(),
            events,
        };
        self.subscribers.notify(&change, &self.state);
    }

    // -------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------

    /// Whether the debounce interval has elapsed with writes pending.
    pub fn flush_due(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.persist.flush_due(now)
    }

    /// Take the coalesced pending write for the host to persist.
    pub fn take_pending_write(&mut self) -> Option<PendingWrite> {
        self.persist.take()
    }

    /// Return a write that failed to persist. In-memory state is untouched.
    ///
    /// A write that no longer lines up with the ones queued since is
    /// replaced by a rewrite of the whole active log.
    pub fn requeue_write(&mut self, write: PendingWrite) {
        if self.persist.requeue(write).is_err() {
            self.resync_pending_write();
        }
    }

    fn enqueue_write(&mut self, base: u64, events: Vec<Event>) {
        if self.persist.enqueue(base, events).is_err() {
            self.resync_pending_write();
        }
    }

    /// Replace the queue with a write that truncates the store to the
    /// checkpoint and appends the active log.
    fn resync_pending_write(&mut self) {
        let write = PendingWrite {
            base: self.log.base_sequence(),
            events: self.log.active_events().to_vec(),
        };
        warn!(
            base = write.base,
            events = write.events.len(),
            "persistence queue out of step, rewriting the active log"
        );
        self.durable_len = None;
        self.persist.replace(write);
    }

    /// Persist the pending write. Returns the number of events written.
    ///
    /// On failure the write is requeued and the error returned; nothing in
    /// memory changes.
    pub async fn flush<S>(&mut self, store: &S) -> Result<usize, StoreError>
    where
        S: EventStore + ?Sized,
    {
        let Some(write) = self.persist.take() else {
            self.persist.mark_flushed();
            return Ok(0);
        };
        match write_to_store(store, &write, self.durable_len).await {
            Ok(()) => {
                self.durable_len = Some(write.end());
                self.persist.mark_flushed();
                debug!(events = write.events.len(), durable = write.end(), "flushed");
                Ok(write.events.len())
            }
            Err(e) => {
                self.durable_len = None;
                self.requeue_write(write);
                Err(e)
            }
        }
    }

    /// Persist the current checkpoint, if compaction has produced one.
    pub async fn store_checkpoint<S>(&self, store: &S) -> Result<bool, StoreError>
    where
        S: EventStore + ?Sized,
    {
        match self.log.checkpoint() {
            Some(checkpoint) => {
                store.snapshot(checkpoint).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // -------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------

    /// The derived scene graph.
    pub const fn state(&self) -> &DesignState {
        &self.state
    }

    /// The event log.
    pub const fn log(&self) -> &EventLog {
        &self.log
    }

    /// The active configuration.
    pub const fn config(&self) -> &CanvasConfig {
        &self.config
    }

    /// Fold counters.
    pub const fn stats(&self) -> CoordinatorStats {
        self.stats
    }

    /// Transform cache counters.
    pub const fn cache_stats(&self) -> canvas_scene::CacheStats {
        self.cache.stats()
    }

    /// Whether a write is waiting to be flushed.
    pub const fn has_pending_write(&self) -> bool {
        !self.persist.is_empty()
    }
}

fn stamp(config: &CanvasConfig, payload: EventPayload) -> Event {
    Event::new(payload).with_user(config.session.user_id.clone())
}

fn buffer(
    tx: &mut Transaction,
    state: &DesignState,
    config: &CanvasConfig,
    payload: EventPayload,
) -> Result<(), canvas_scene::ValidationError> {
    validate_in_scope(state, tx.scope(), &payload, config.transform.max_depth)?;
    tx.push(state, stamp(config, payload));
    Ok(())
}

fn count(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

async fn write_to_store<S>(
    store: &S,
    write: &PendingWrite,
    durable_len: Option<u64>,
) -> Result<(), StoreError>
where
    S: EventStore + ?Sized,
{
    if durable_len.is_none_or(|len| len > write.base) {
        store.truncate(write.base).await?;
    }
    store.append(&write.events).await
}
