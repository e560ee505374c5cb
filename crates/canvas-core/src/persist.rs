//! Debounced persistence queue.
//!
//! Every commit, dispatch, undo and redo enqueues one [`PendingWrite`]
//! describing how the durable log must change: keep the first `base` stored
//! events, then append `events`. Consecutive writes coalesce into one, so a
//! burst of edits between flushes costs a single store round-trip. A failed
//! flush puts its write back in front of anything queued since, so no edit
//! is ever dropped. Two writes that leave a hole between them cannot be
//! coalesced; the queue reports a [`WriteGap`] and the caller rebuilds the
//! write from its log.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use canvas_types::Event;

use crate::error::WriteGap;

/// A coalesced change to the durable log.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    /// Number of stored events to keep before appending.
    pub base: u64,
    /// Events to append after the kept prefix.
    pub events: Vec<Event>,
}

impl PendingWrite {
    /// Sequence number just past the last event of this write.
    pub fn end(&self) -> u64 {
        self.base
            .saturating_add(u64::try_from(self.events.len()).unwrap_or(u64::MAX))
    }

    /// Whether the write only truncates.
    pub fn is_truncation_only(&self) -> bool {
        self.events.is_empty()
    }

    /// Combine this write with one issued after it.
    ///
    /// # Errors
    ///
    /// Returns [`WriteGap`] when `later` starts past the end of this write;
    /// the events in between are in neither write.
    pub fn merge(mut self, later: Self) -> Result<Self, WriteGap> {
        if later.base < self.base {
            return Ok(later);
        }
        if later.base > self.end() {
            return Err(WriteGap {
                end: self.end(),
                base: later.base,
            });
        }
        let keep = usize::try_from(later.base.saturating_sub(self.base)).unwrap_or(usize::MAX);
        self.events.truncate(keep);
        self.events.extend(later.events);
        Ok(self)
    }
}

/// Queue of writes waiting for the next flush.
#[derive(Debug, Clone)]
pub struct PersistQueue {
    pending: Option<PendingWrite>,
    oldest_pending: Option<DateTime<Utc>>,
    flush_interval: Duration,
    enqueued: u64,
}

impl PersistQueue {
    /// Create an empty queue that considers a flush due `flush_interval_ms`
    /// after the oldest unflushed write.
    pub fn new(flush_interval_ms: u64) -> Self {
        let millis = i64::try_from(flush_interval_ms).unwrap_or(i64::MAX);
        Self {
            pending: None,
            oldest_pending: None,
            flush_interval: Duration::try_milliseconds(millis).unwrap_or(Duration::MAX),
            enqueued: 0,
        }
    }

    /// Queue one write: keep `base` stored events, then append `events`.
    ///
    /// # Errors
    ///
    /// Returns [`WriteGap`] when the write cannot be coalesced with the one
    /// already waiting. The waiting write is kept and the new one dropped;
    /// the caller must [`replace`](Self::replace) the queue with a full
    /// rewrite.
    pub fn enqueue(&mut self, base: u64, events: Vec<Event>) -> Result<(), WriteGap> {
        self.enqueue_at(base, events, Utc::now())
    }

    /// [`enqueue`](Self::enqueue) with an explicit clock.
    ///
    /// # Errors
    ///
    /// See [`enqueue`](Self::enqueue).
    pub fn enqueue_at(
        &mut self,
        base: u64,
        events: Vec<Event>,
        now: DateTime<Utc>,
    ) -> Result<(), WriteGap> {
        let write = PendingWrite { base, events };
        self.enqueued = self.enqueued.saturating_add(1);
        self.oldest_pending.get_or_insert(now);
        match self.pending.take() {
            Some(earlier) => {
                let kept = earlier.clone();
                match earlier.merge(write) {
                    Ok(merged) => {
                        self.pending = Some(merged);
                        Ok(())
                    }
                    Err(gap) => {
                        warn!(end = gap.end, base = gap.base, "persistence write leaves a gap");
                        self.pending = Some(kept);
                        Err(gap)
                    }
                }
            }
            None => {
                self.pending = Some(write);
                Ok(())
            }
        }
    }

    /// Drop whatever is waiting and queue `write` in its place.
    pub fn replace(&mut self, write: PendingWrite) {
        debug!(base = write.base, events = write.events.len(), "persistence write replaced");
        self.pending = Some(write);
        self.oldest_pending.get_or_insert_with(Utc::now);
    }

    /// Whether the debounce interval has elapsed since the oldest unflushed
    /// write.
    pub fn flush_due(&self, now: DateTime<Utc>) -> bool {
        self.oldest_pending
            .is_some_and(|since| now.signed_duration_since(since) >= self.flush_interval)
    }

    /// Hand the coalesced write to the caller, emptying the queue.
    pub fn take(&mut self) -> Option<PendingWrite> {
        let write = self.pending.take()?;
        debug!(base = write.base, events = write.events.len(), "persistence write taken");
        Some(write)
    }

    /// Put a failed write back in front of anything queued since it was
    /// taken.
    ///
    /// # Errors
    ///
    /// Returns [`WriteGap`] when the writes queued since do not continue
    /// the failed one. The failed write is kept; the caller must
    /// [`replace`](Self::replace) the queue with a full rewrite.
    pub fn requeue(&mut self, write: PendingWrite) -> Result<(), WriteGap> {
        self.requeue_at(write, Utc::now())
    }

    /// [`requeue`](Self::requeue) with an explicit clock.
    ///
    /// # Errors
    ///
    /// See [`requeue`](Self::requeue).
    pub fn requeue_at(&mut self, write: PendingWrite, now: DateTime<Utc>) -> Result<(), WriteGap> {
        warn!(
            base = write.base,
            events = write.events.len(),
            "persistence write failed, requeued"
        );
        self.oldest_pending = Some(self.oldest_pending.map_or(now, |t| t.min(now)));
        match self.pending.take() {
            Some(later) => {
                let kept = write.clone();
                match write.merge(later) {
                    Ok(merged) => {
                        self.pending = Some(merged);
                        Ok(())
                    }
                    Err(gap) => {
                        self.pending = Some(kept);
                        Err(gap)
                    }
                }
            }
            None => {
                self.pending = Some(write);
                Ok(())
            }
        }
    }

    /// Mark the queue as flushed; resets the debounce timer when nothing is
    /// left.
    pub fn mark_flushed(&mut self) {
        if self.pending.is_none() {
            self.oldest_pending = None;
        }
    }

    /// Whether a write is waiting.
    pub const fn is_empty(&self) -> bool {
        self.pending.is_none()
    }

    /// The waiting write, if any.
    pub const fn pending(&self) -> Option<&PendingWrite> {
        self.pending.as_ref()
    }

    /// Number of writes enqueued since creation (before coalescing).
    pub const fn enqueued(&self) -> u64 {
        self.enqueued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_types::{EventPayload, PageId};

    fn events(n: usize) -> Vec<Event> {
        (0..n)
            .map(|_| {
                Event::new(EventPayload::CreatePage {
                    page_id: PageId::new(),
                    name: String::new(),
                })
            })
            .collect()
    }

    #[test]
    fn consecutive_appends_coalesce() {
        let mut queue = PersistQueue::new(1_000);
        let a = events(2);
        let b = events(3);
        queue.enqueue(0, a.clone()).unwrap();
        queue.enqueue(2, b.clone()).unwrap();
        let write = queue.take().unwrap();
        assert_eq!(write.base, 0);
        assert_eq!(write.events, [a, b].concat());
        assert_eq!(queue.enqueued(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn undo_then_new_edit_replaces_the_tail() {
        let mut queue = PersistQueue::new(1_000);
        let a = events(3);
        let b = events(1);
        queue.enqueue(10, a.clone()).unwrap();
        // Undo of the last event, then a new edit.
        queue.enqueue(12, Vec::new()).unwrap();
        queue.enqueue(12, b.clone()).unwrap();
        let write = queue.take().unwrap();
        assert_eq!(write.base, 10);
        assert_eq!(write.events.len(), 3);
        assert_eq!(write.events.get(..2), a.get(..2));
        assert_eq!(write.events.get(2), b.first());
    }

    #[test]
    fn truncation_below_base_wins() {
        let mut queue = PersistQueue::new(1_000);
        queue.enqueue(10, events(3)).unwrap();
        queue.enqueue(4, Vec::new()).unwrap();
        let write = queue.take().unwrap();
        assert_eq!(write.base, 4);
        assert!(write.is_truncation_only());
    }

    #[test]
    fn requeue_goes_in_front_of_newer_writes() {
        let mut queue = PersistQueue::new(1_000);
        let first = events(2);
        let second = events(1);
        queue.enqueue(0, first.clone()).unwrap();
        let failed = queue.take().unwrap();
        queue.enqueue(2, second.clone()).unwrap();
        queue.requeue(failed).unwrap();
        let write = queue.take().unwrap();
        assert_eq!(write.base, 0);
        assert_eq!(write.events, [first, second].concat());
    }

    #[test]
    fn writes_with_a_hole_between_them_do_not_coalesce() {
        let first = PendingWrite {
            base: 0,
            events: events(2),
        };
        let later = PendingWrite {
            base: 5,
            events: events(1),
        };
        assert_eq!(first.clone().merge(later), Err(WriteGap { end: 2, base: 5 }));

        let mut queue = PersistQueue::new(1_000);
        queue.enqueue(0, first.events.clone()).unwrap();
        assert_eq!(queue.enqueue(5, events(1)), Err(WriteGap { end: 2, base: 5 }));
        assert_eq!(queue.pending(), Some(&first));

        // A stale write handed back after newer ones were flushed.
        let stale = queue.take().unwrap();
        queue.enqueue(3, events(1)).unwrap();
        assert!(queue.requeue(stale.clone()).is_err());
        assert_eq!(queue.pending(), Some(&stale));

        let rewrite = PendingWrite {
            base: 0,
            events: events(4),
        };
        queue.replace(rewrite.clone());
        assert_eq!(queue.take(), Some(rewrite));
    }

    #[test]
    fn flush_due_after_interval() {
        let mut queue = PersistQueue::new(30_000);
        let start = Utc::now();
        assert!(!queue.flush_due(start));
        queue.enqueue_at(0, events(1), start).unwrap();
        assert!(!queue.flush_due(start + Duration::seconds(29)));
        assert!(queue.flush_due(start + Duration::seconds(30)));

        let _ = queue.take();
        queue.mark_flushed();
        assert!(!queue.flush_due(start + Duration::seconds(60)));
    }
}
