//! Change notifications for UI subscribers.
//!
//! Listeners are called synchronously, once per committed change, after the
//! state and transform cache are already consistent. A transaction of many
//! events produces one notification.

use std::collections::BTreeMap;

use serde::Serialize;

use canvas_scene::DesignState;

/// What kind of operation produced a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A single dispatched edit.
    Dispatch,
    /// A committed transaction.
    Commit,
    /// An undo step.
    Undo,
    /// A redo step.
    Redo,
    /// The selection changed.
    Selection,
}

/// Summary handed to listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    /// The producing operation.
    pub kind: ChangeKind,
    /// Global log sequence after the change.
    pub sequence: u64,
    /// Number of events folded or unfolded.
    pub events: usize,
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// Callback invoked after each change.
///
/// Implemented for every `FnMut(&Change, &DesignState) + Send` closure.
pub trait ChangeListener: Send {
    /// Called after a change has been applied.
    fn on_change(&mut self, change: &Change, state: &DesignState);
}

impl<F> ChangeListener for F
where
    F: FnMut(&Change, &DesignState) + Send,
{
    fn on_change(&mut self, change: &Change, state: &DesignState) {
        self(change, state);
    }
}

/// The registered listeners.
#[derive(Default)]
pub struct Subscribers {
    next_id: u64,
    listeners: BTreeMap<SubscriptionId, Box<dyn ChangeListener>>,
}

impl core::fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscribers")
            .field("count", &self.listeners.len())
            .finish()
    }
}

impl Subscribers {
    /// Register a listener.
    pub fn subscribe(&mut self, listener: Box<dyn ChangeListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.listeners.insert(id, listener);
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    /// Call every listener in registration order.
    pub fn notify(&mut self, change: &Change, state: &DesignState) {
        for listener in self.listeners.values_mut() {
            listener.on_change(change, state);
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
