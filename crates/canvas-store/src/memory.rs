//! In-memory [`EventStore`] for tests and ephemeral sessions.

use async_trait::async_trait;
use tokio::sync::Mutex;

use canvas_history::Checkpoint;
use canvas_types::Event;

use crate::{EventStore, StoreError};

#[derive(Debug, Default)]
struct Inner {
    events: Vec<Event>,
    checkpoint: Option<Checkpoint>,
    failing_writes: usize,
    writes: usize,
}

/// An [`EventStore`] that keeps everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` writes (`append`, `truncate`, `snapshot`)
    /// fail with [`StoreError::Unavailable`].
    pub async fn fail_next_writes(&self, count: usize) {
        self.inner.lock().await.failing_writes = count;
    }

    /// Number of successful writes so far.
    pub async fn write_count(&self) -> usize {
        self.inner.lock().await.writes
    }

    /// Number of stored events.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.events.len()
    }

    /// Whether no events are stored.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.events.is_empty()
    }
}

impl Inner {
    fn begin_write(&mut self, op: &str) -> Result<(), StoreError> {
        if self.failing_writes > 0 {
            self.failing_writes = self.failing_writes.saturating_sub(1);
            return Err(StoreError::Unavailable(format!("injected failure on {op}")));
        }
        self.writes = self.writes.saturating_add(1);
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn append(&self, events: &[Event]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.begin_write("append")?;
        inner.events.extend_from_slice(events);
        Ok(())
    }

    async fn truncate(&self, len: u64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.begin_write("truncate")?;
        let len = usize::try_from(len).unwrap_or(usize::MAX);
        inner.events.truncate(len);
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<Event>, StoreError> {
        Ok(self.inner.lock().await.events.clone())
    }

    async fn snapshot(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.begin_write("snapshot")?;
        inner.checkpoint = Some(checkpoint.clone());
        Ok(())
    }

    async fn load_snapshot(&self) -> Result<Option<Checkpoint>, StoreError> {
        Ok(self.inner.lock().await.checkpoint.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_types::{EventPayload, PageId};

    fn page_event() -> Event {
        Event::new(EventPayload::CreatePage {
            page_id: PageId::new(),
            name: "Page".to_owned(),
        })
    }

    #[tokio::test]
    async fn append_load_and_truncate() {
        let store = MemoryStore::new();
        let events = vec![page_event(), page_event(), page_event()];
        assert!(store.append(&events).await.is_ok());
        assert_eq!(store.load_all().await.ok(), Some(events.clone()));

        assert!(store.truncate(1).await.is_ok());
        assert_eq!(store.len().await, 1);
        assert!(store.truncate(10).await.is_ok());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn injected_failures_leave_contents_untouched() {
        let store = MemoryStore::new();
        store.fail_next_writes(1).await;
        let result = store.append(&[page_event()]).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert!(store.is_empty().await);

        assert!(store.append(&[page_event()]).await.is_ok());
        assert_eq!(store.len().await, 1);
        assert_eq!(store.write_count().await, 1);
    }
}
