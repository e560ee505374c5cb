//! Integration tests for the file-backed store: recovery from damaged
//! records, truncation, and checkpoint persistence.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use canvas_history::{Checkpoint, EventLog};
use canvas_scene::DesignState;
use canvas_store::file::{CHECKPOINT_FILE, EVENTS_FILE};
use canvas_store::{EventStore, FileStore};
use canvas_types::{ElementId, ElementKind, Event, EventPayload, PageId, Point, Size, Styles};

fn session() -> (Vec<Event>, ElementId) {
    let page = PageId::new();
    let element = ElementId::new();
    let events = vec![
        Event::new(EventPayload::CreatePage {
            page_id: page,
            name: "Home".to_owned(),
        }),
        Event::new(EventPayload::CreateElement {
            element_id: element,
            kind: ElementKind::Frame,
            page_id: page,
            parent_id: None,
            position: Point::ZERO,
            size: Size::new(100.0, 100.0),
            rotation: 0.0,
            name: "Card".to_owned(),
            content: None,
            styles: Styles::default(),
        }),
        Event::new(EventPayload::MoveElement {
            element_id: element,
            position: Point::new(30.0, 40.0),
        }),
    ];
    (events, element)
}

#[tokio::test]
async fn malformed_and_unknown_records_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).await.unwrap();
    let (events, element) = session();
    store.append(&events[..2]).await.unwrap();

    // A torn write, and a record written by a newer client.
    let path = dir.path().join(EVENTS_FILE);
    let mut raw = tokio::fs::read_to_string(&path).await.unwrap();
    raw.push_str("{\"id\": \"not-a-uuid\", \"timest\n");
    raw.push_str(
        "{\"id\":\"0190a0a0-0000-7000-8000-000000000000\",\"timestamp\":1,\
         \"payload\":{\"type\":\"SET_GUIDES\",\"data\":{}}}\n",
    );
    tokio::fs::write(&path, raw).await.unwrap();
    store.append(&events[2..]).await.unwrap();

    let loaded = store.load_all().await.unwrap();
    assert_eq!(loaded, events);

    let log = EventLog::from_parts(None, loaded);
    let state = log.replay();
    assert_eq!(
        state.element(element).map(|e| e.position),
        Some(Point::new(30.0, 40.0))
    );
}

#[tokio::test]
async fn truncate_rewrites_the_log() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).await.unwrap();
    let (events, _) = session();
    store.append(&events).await.unwrap();

    store.truncate(1).await.unwrap();
    assert_eq!(store.load_all().await.unwrap(), events[..1].to_vec());

    // Appending after truncation continues from the new end.
    store.append(&events[1..2]).await.unwrap();
    assert_eq!(store.load_all().await.unwrap(), events[..2].to_vec());
}

#[tokio::test]
async fn truncate_keeps_damaged_lines_before_the_cut() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).await.unwrap();
    let (events, element) = session();
    store.append(&events[..1]).await.unwrap();

    let path = dir.path().join(EVENTS_FILE);
    let mut raw = tokio::fs::read_to_string(&path).await.unwrap();
    raw.push_str("{\"id\": \"torn\n");
    tokio::fs::write(&path, raw).await.unwrap();
    store.append(&events[1..]).await.unwrap();

    // Two loadable records survive; the damaged line stays where it was.
    store.truncate(2).await.unwrap();
    let raw = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(raw.lines().count(), 3);
    assert!(raw.contains("torn"));

    let reopened = FileStore::open(dir.path()).await.unwrap();
    let loaded = reopened.load_all().await.unwrap();
    assert_eq!(loaded, events[..2].to_vec());

    // A checkpoint over the first record still lines up after reload.
    let folded = canvas_scene::reduce_all(DesignState::new(), &events[..1]);
    reopened
        .snapshot(&Checkpoint::new(folded, 1))
        .await
        .unwrap();
    let log = EventLog::from_parts(reopened.load_snapshot().await.unwrap(), loaded);
    assert_eq!(log.len(), 1);
    assert!(log.replay().contains_element(element));

    // Truncating past the end is a no-op.
    reopened.truncate(5).await.unwrap();
    assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), raw);
}

#[tokio::test]
async fn checkpoint_round_trips_and_replay_skips_folded_events() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).await.unwrap();
    let (events, element) = session();
    store.append(&events).await.unwrap();

    let folded = canvas_scene::reduce_all(DesignState::new(), &events[..2]);
    let checkpoint = Checkpoint::new(folded, 2);
    store.snapshot(&checkpoint).await.unwrap();

    let reopened = FileStore::open(dir.path()).await.unwrap();
    let loaded_checkpoint = reopened.load_snapshot().await.unwrap();
    assert_eq!(loaded_checkpoint.as_ref(), Some(&checkpoint));

    let log = EventLog::from_parts(loaded_checkpoint, reopened.load_all().await.unwrap());
    assert_eq!(log.len(), 1);
    assert_eq!(
        log.replay().element(element).map(|e| e.position),
        Some(Point::new(30.0, 40.0))
    );
}

#[tokio::test]
async fn damaged_checkpoint_falls_back_to_full_replay() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).await.unwrap();
    tokio::fs::write(dir.path().join(CHECKPOINT_FILE), b"{ not json")
        .await
        .unwrap();
    assert!(store.load_snapshot().await.unwrap().is_none());
}
