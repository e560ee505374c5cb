//! Session host binary for the canvas.
//!
//! Opens the durable event store, restores the session through the
//! coordinator, verifies the scene graph, optionally imports a file of
//! edits, then flushes and compacts before exiting.
//!
//! # Usage
//!
//! ```text
//! canvas-engine [IMPORT.jsonl]
//! ```
//!
//! `IMPORT.jsonl` holds one JSON event payload per line. Each line is
//! validated and applied as its own undo step; rejected lines are logged
//! and skipped.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `canvas-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Open the file store under `persistence.data_dir`
//! 4. Restore the session from checkpoint plus event log
//! 5. Check scene graph integrity
//! 6. Import edits, if a file was given
//! 7. Flush pending writes
//! 8. Compact the log and persist the checkpoint

mod error;

use std::path::Path;

use canvas_core::config::LoggingConfig;
use canvas_core::{CanvasConfig, Coordinator};
use canvas_scene::check_integrity;
use canvas_store::FileStore;
use canvas_types::EventPayload;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

const CONFIG_FILE: &str = "canvas-config.yaml";

/// Application entry point for the canvas engine.
///
/// # Errors
///
/// Returns an error if configuration, the store, or the import file cannot
/// be read, or if the final flush fails.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!(
        from_file,
        data_dir = %config.persistence.data_dir.display(),
        snapshot_threshold = config.history.snapshot_threshold,
        retain_undo_depth = config.history.retain_undo_depth,
        max_depth = config.transform.max_depth,
        "configuration loaded"
    );

    // 3. Open the store.
    let store = FileStore::open(&config.persistence.data_dir).await?;

    // 4. Restore the session.
    let max_depth = config.transform.max_depth;
    let mut coordinator = Coordinator::load(config, &store).await?;

    // 5. Verify the scene graph.
    let violations = check_integrity(coordinator.state(), max_depth);
    for violation in &violations {
        warn!(%violation, "integrity violation");
    }
    info!(
        elements = coordinator.state().element_count(),
        pages = coordinator.state().page_count(),
        sequence = coordinator.log().sequence(),
        violations = violations.len(),
        "session restored"
    );

    // 6. Import edits.
    if let Some(path) = std::env::args().nth(1) {
        import(&mut coordinator, &path).await?;
    }

    // 7. Flush. The checkpoint must never cover events the store lacks.
    let written = coordinator.flush(&store).await?;

    // 8. Compact and persist the checkpoint.
    if let Some(folded) = coordinator.compact() {
        info!(folded, "event log compacted");
        coordinator.store_checkpoint(&store).await?;
    }

    let stats = coordinator.stats();
    info!(
        written,
        fold_count = stats.fold_count,
        events_folded = stats.events_folded,
        "canvas-engine finished"
    );
    Ok(())
}

/// Load configuration from `canvas-config.yaml`, falling back to defaults
/// when the file is absent. Returns whether the file was read.
fn load_config() -> Result<(CanvasConfig, bool), EngineError> {
    let config_path = Path::new(CONFIG_FILE);
    if config_path.exists() {
        Ok((CanvasConfig::from_file(config_path)?, true))
    } else {
        let mut config = CanvasConfig::default();
        config.apply_env_overrides();
        Ok((config, false))
    }
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Apply every payload in a JSON lines file, one undo step per line.
async fn import(coordinator: &mut Coordinator, path: &str) -> Result<(), EngineError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| EngineError::Import {
            path: path.to_owned(),
            source,
        })?;

    let mut applied: usize = 0;
    let mut rejected: usize = 0;
    for (index, line) in contents.lines().enumerate() {
        let line_no = index.saturating_add(1);
        if line.trim().is_empty() {
            continue;
        }
        let payload: EventPayload = match serde_json::from_str(line) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(line = line_no, error = %e, "unparseable edit skipped");
                rejected = rejected.saturating_add(1);
                continue;
            }
        };
        match coordinator.dispatch(payload) {
            Ok(_) => {
                applied = applied.saturating_add(1);
            }
            Err(e) => {
                warn!(line = line_no, error = %e, "edit rejected");
                rejected = rejected.saturating_add(1);
            }
        }
    }
    info!(path, applied, rejected, "import finished");
    Ok(())
}
