//! Configuration loading and typed config structures for the canvas engine.
//!
//! The canonical configuration lives in `canvas-config.yaml` at the project
//! root. This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads the file. Every section and
//! every field is optional; missing values fall back to the defaults below.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use canvas_history::{DEFAULT_RETAIN_UNDO_DEPTH, DEFAULT_SNAPSHOT_THRESHOLD};

/// Environment variable that overrides `persistence.data_dir`.
pub const DATA_DIR_ENV: &str = "CANVAS_DATA_DIR";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
///
/// Mirrors the structure of `canvas-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CanvasConfig {
    /// Undo depth and compaction.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Transform cache limits.
    #[serde(default)]
    pub transform: TransformConfig,

    /// Write debouncing and storage location.
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Per-session identity.
    #[serde(default)]
    pub session: SessionConfig,

    /// Log level and format.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CanvasConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `CANVAS_DATA_DIR` overrides `persistence.data_dir` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string. No environment overrides
    /// are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document is a valid, all-default config.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
            self.persistence.data_dir = PathBuf::from(dir);
        }
    }
}

/// Event log compaction settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryConfig {
    /// Compact once the active log holds more than this many events.
    #[serde(default = "default_snapshot_threshold")]
    pub snapshot_threshold: usize,

    /// Undo depth (in events) kept behind the cursor after compaction.
    #[serde(default = "default_retain_undo_depth")]
    pub retain_undo_depth: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            snapshot_threshold: default_snapshot_threshold(),
            retain_undo_depth: default_retain_undo_depth(),
        }
    }
}

/// Transform cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransformConfig {
    /// Maximum number of ancestors an element may have.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PersistenceConfig {
    /// Minimum interval between background flushes, in milliseconds.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Directory holding the event log and checkpoint.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: default_flush_interval_ms(),
            data_dir: default_data_dir(),
        }
    }
}

/// Session settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Author stamped on every event, if set.
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_snapshot_threshold() -> usize {
    DEFAULT_SNAPSHOT_THRESHOLD
}

const fn default_retain_undo_depth() -> usize {
    DEFAULT_RETAIN_UNDO_DEPTH
}

const fn default_max_depth() -> usize {
    256
}

const fn default_flush_interval_ms() -> u64 {
    30_000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CanvasConfig::default();
        assert_eq!(config.history.snapshot_threshold, 10_000);
        assert_eq!(config.history.retain_undo_depth, 1_000);
        assert_eq!(config.transform.max_depth, 256);
        assert_eq!(config.persistence.flush_interval_ms, 30_000);
        assert_eq!(config.persistence.data_dir, PathBuf::from("data"));
        assert_eq!(config.session.user_id, None);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
history:
  snapshot_threshold: 500
  retain_undo_depth: 50

transform:
  max_depth: 32

persistence:
  flush_interval_ms: 1000
  data_dir: "/var/lib/canvas"

session:
  user_id: "designer-7"

logging:
  level: "debug"
  json: true
"#;
        let config = CanvasConfig::parse(yaml).unwrap();
        assert_eq!(config.history.snapshot_threshold, 500);
        assert_eq!(config.history.retain_undo_depth, 50);
        assert_eq!(config.transform.max_depth, 32);
        assert_eq!(config.persistence.flush_interval_ms, 1000);
        assert_eq!(config.persistence.data_dir, PathBuf::from("/var/lib/canvas"));
        assert_eq!(config.session.user_id.as_deref(), Some("designer-7"));
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn partial_yaml_uses_defaults() {
        let config = CanvasConfig::parse("transform:\n  max_depth: 8\n").unwrap();
        assert_eq!(config.transform.max_depth, 8);
        assert_eq!(config.history, HistoryConfig::default());
        assert_eq!(config.persistence, PersistenceConfig::default());
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(CanvasConfig::parse("").unwrap(), CanvasConfig::default());
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let result = CanvasConfig::parse("history: [unclosed");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn data_dir_override() {
        let mut config = CanvasConfig::default();
        config.apply_overrides(|key| (key == DATA_DIR_ENV).then(|| "/tmp/canvas".to_owned()));
        assert_eq!(config.persistence.data_dir, PathBuf::from("/tmp/canvas"));

        // Empty values are ignored.
        config.apply_overrides(|_| Some(String::new()));
        assert_eq!(config.persistence.data_dir, PathBuf::from("/tmp/canvas"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = CanvasConfig::from_file(Path::new("/nonexistent/canvas-config.yaml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
