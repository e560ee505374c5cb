//! File-backed [`EventStore`]: a JSON lines event log and a JSON checkpoint.
//!
//! Layout inside the data directory:
//!
//! ```text
//! events.jsonl     one serialized Event per line, append-only
//! checkpoint.json  the latest Checkpoint
//! ```
//!
//! Rewrites (truncation, checkpoint replacement) go through a temporary file
//! and a rename so a crash never leaves a half-written file behind.
//!
//! Lines that fail to parse are skipped on load but never rewritten away:
//! positions in the log are counted in loadable records only.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use canvas_history::Checkpoint;
use canvas_types::Event;

use crate::{EventStore, StoreError};

/// File name of the event log.
pub const EVENTS_FILE: &str = "events.jsonl";

/// File name of the checkpoint.
pub const CHECKPOINT_FILE: &str = "checkpoint.json";

/// An [`EventStore`] rooted at a data directory.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    /// Serializes writers within this process.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open (creating if needed) a store in `dir`.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;
        debug!(dir = %dir.display(), "file store opened");
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// The data directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn events_path(&self) -> PathBuf {
        self.dir.join(EVENTS_FILE)
    }

    fn checkpoint_path(&self) -> PathBuf {
        self.dir.join(CHECKPOINT_FILE)
    }

    /// Raw contents of the event log; empty when the file is missing.
    async fn read_log(&self) -> Result<String, StoreError> {
        let path = self.events_path();
        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    /// Parse the event log, skipping blank and malformed lines.
    async fn read_events(&self) -> Result<Vec<Event>, StoreError> {
        let path = self.events_path();
        let contents = self.read_log().await?;

        let mut events = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            match parse_line(line) {
                None => {}
                Some(Ok(event)) => events.push(event),
                Some(Err(e)) => {
                    warn!(
                        path = %path.display(),
                        line = index.saturating_add(1),
                        error = %e,
                        "skipping malformed event record"
                    );
                }
            }
        }
        Ok(events)
    }

    async fn replace_file(&self, path: &Path, contents: &[u8]) -> Result<(), StoreError> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, contents)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, path)
            .await
            .map_err(|e| StoreError::io(path, e))
    }
}

/// `None` for a blank line.
fn parse_line(line: &str) -> Option<Result<Event, serde_json::Error>> {
    if line.trim().is_empty() {
        None
    } else {
        Some(serde_json::from_str(line))
    }
}

/// Byte offset just past the `len`-th loadable record, and the number of
/// loadable records after it.
fn cut_point(contents: &str, len: usize) -> (Option<usize>, usize) {
    let mut cut = (len == 0).then_some(0);
    let mut seen: usize = 0;
    let mut offset: usize = 0;
    let mut dropped: usize = 0;
    for line in contents.split_inclusive('\n') {
        offset = offset.saturating_add(line.len());
        let loadable = matches!(parse_line(line), Some(Ok(_)));
        if !loadable {
            continue;
        }
        if cut.is_some() {
            dropped = dropped.saturating_add(1);
        } else {
            seen = seen.saturating_add(1);
            if seen == len {
                cut = Some(offset);
            }
        }
    }
    (cut, dropped)
}

fn encode_lines(events: &[Event]) -> Result<Vec<u8>, StoreError> {
    let mut buf = Vec::new();
    for event in events {
        serde_json::to_writer(&mut buf, event)?;
        buf.push(b'\n');
    }
    Ok(buf)
}

#[async_trait]
impl EventStore for FileStore {
    async fn append(&self, events: &[Event]) -> Result<(), StoreError> {
        if events.is_empty() {
            return Ok(());
        }
        let buf = encode_lines(events)?;
        let path = self.events_path();
        let _guard = self.write_lock.lock().await;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        file.write_all(&buf)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        file.sync_data()
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        debug!(count = events.len(), "events appended to file store");
        Ok(())
    }

    /// `len` counts loadable records, the same unit [`load_all`] returns.
    /// Malformed lines before the cut are kept byte for byte so that the
    /// offsets a checkpoint relies on do not shift.
    ///
    /// [`load_all`]: EventStore::load_all
    async fn truncate(&self, len: u64) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let contents = self.read_log().await?;
        let len = usize::try_from(len).unwrap_or(usize::MAX);
        let cut = match cut_point(&contents, len) {
            (Some(cut), dropped) if dropped > 0 => {
                debug!(kept = len, dropped, "file store truncated");
                cut
            }
            _ => return Ok(()),
        };
        let kept = contents.as_bytes().get(..cut).unwrap_or_default();
        self.replace_file(&self.events_path(), kept).await
    }

    async fn load_all(&self) -> Result<Vec<Event>, StoreError> {
        self.read_events().await
    }

    async fn snapshot(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        let buf = serde_json::to_vec(checkpoint)?;
        let _guard = self.write_lock.lock().await;
        self.replace_file(&self.checkpoint_path(), &buf).await?;
        debug!(sequence = checkpoint.sequence, "checkpoint written");
        Ok(())
    }

    async fn load_snapshot(&self) -> Result<Option<Checkpoint>, StoreError> {
        let path = self.checkpoint_path();
        let contents = match fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        // The full event log is kept, so a damaged checkpoint only costs a
        // longer replay.
        match serde_json::from_slice(&contents) {
            Ok(checkpoint) => Ok(Some(checkpoint)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable checkpoint");
                Ok(None)
            }
        }
    }
}
