//! Deduplication configuration.
//!
//! This module defines the immutable configuration value passed to the
//! deduplication engine at construction time.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable toggling the engine.
pub const ENABLED_ENV: &str = "LOGDEDUP_DEDUP_ENABLED";
/// Environment variable for the retention window in minutes.
pub const WINDOW_MINUTES_ENV: &str = "LOGDEDUP_DEDUP_WINDOW_MINUTES";
/// Environment variable for the comma-separated excluded column list.
pub const EXCLUDED_COLUMNS_ENV: &str = "LOGDEDUP_DEDUP_EXCLUDED_COLUMNS";
/// Environment variable for the backing file path.
pub const STORAGE_PATH_ENV: &str = "LOGDEDUP_DEDUP_STORAGE_PATH";

/// Default retention window (15 minutes).
pub const DEFAULT_RETENTION_WINDOW: Duration = Duration::from_secs(15 * 60);

/// File name of the backing store inside the data directory.
pub const STORE_FILE_NAME: &str = "processed_data_hashes.json";

/// Timestamp-like columns excluded from hashing unless configured otherwise.
pub const DEFAULT_EXCLUDED_COLUMNS: &[&str] = &[
    "timestamp",
    "time",
    "datetime",
    "date",
    "created_at",
    "updated_at",
    "processed_at",
    "logged_at",
    "received_at",
    "sent_at",
];

/// Configuration for the deduplication engine.
///
/// # Environment Variables
///
/// | Variable | Type | Default | Description |
/// |----------|------|---------|-------------|
/// | `LOGDEDUP_DEDUP_ENABLED` | bool | `true` | Enable deduplication |
/// | `LOGDEDUP_DEDUP_WINDOW_MINUTES` | u64 | `15` | Retention window |
/// | `LOGDEDUP_DEDUP_EXCLUDED_COLUMNS` | list | timestamp columns | Columns never hashed |
/// | `LOGDEDUP_DEDUP_STORAGE_PATH` | path | data dir | Backing JSON file |
///
/// # Example
///
/// ```rust
/// use logdedup::services::deduplication::DeduplicationConfig;
/// use std::time::Duration;
///
/// let config = DeduplicationConfig::default();
/// assert!(config.enabled);
/// assert_eq!(config.retention_window, Duration::from_secs(900));
/// assert!(config.excluded_columns.contains("timestamp"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeduplicationConfig {
    /// Master switch. When false the engine passes every row through.
    pub enabled: bool,

    /// Records older than this (relative to "now") are evicted.
    pub retention_window: Duration,

    /// Column names excluded from hashing, stored lowercased and trimmed.
    pub excluded_columns: BTreeSet<String>,

    /// Location of the backing JSON file.
    pub storage_path: PathBuf,
}

impl DeduplicationConfig {
    /// Creates a new configuration from environment variables.
    ///
    /// Falls back to defaults for any unset or unparseable variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies environment variable overrides on top of `self`.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies `LOGDEDUP_DEDUP_*` overrides read through `lookup`.
    ///
    /// Unparseable values leave the current setting in place, and a blank
    /// storage path is ignored.
    #[must_use]
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENABLED_ENV) {
            self.enabled = parse_bool(&v).unwrap_or(self.enabled);
        }

        if let Some(minutes) = lookup(WINDOW_MINUTES_ENV).and_then(|v| v.trim().parse::<u64>().ok())
        {
            self.retention_window = Duration::from_secs(minutes.saturating_mul(60));
        }

        if let Some(v) = lookup(EXCLUDED_COLUMNS_ENV) {
            self = self.with_excluded_columns(v.split(','));
        }

        if let Some(v) = lookup(STORAGE_PATH_ENV).filter(|v| !v.trim().is_empty()) {
            self.storage_path = PathBuf::from(v.trim());
        }

        self
    }

    /// Returns the default backing file location.
    ///
    /// Uses the platform data directory when available, `.logdedup/` otherwise.
    #[must_use]
    pub fn default_storage_path() -> PathBuf {
        directories::ProjectDirs::from("", "", "logdedup").map_or_else(
            || PathBuf::from(".logdedup").join(STORE_FILE_NAME),
            |dirs| dirs.data_dir().join(STORE_FILE_NAME),
        )
    }

    /// Builder method to set enabled state.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builder method to set the retention window.
    #[must_use]
    pub const fn with_retention_window(mut self, window: Duration) -> Self {
        self.retention_window = window;
        self
    }

    /// Builder method to replace the excluded column set.
    ///
    /// Names are trimmed and lowercased; blank names are ignored.
    #[must_use]
    pub fn with_excluded_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded_columns = columns
            .into_iter()
            .map(|c| normalize_column_name(c.as_ref()))
            .filter(|c| !c.is_empty())
            .collect();
        self
    }

    /// Builder method to set the backing file path.
    #[must_use]
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_window: DEFAULT_RETENTION_WINDOW,
            excluded_columns: DEFAULT_EXCLUDED_COLUMNS
                .iter()
                .map(|c| (*c).to_string())
                .collect(),
            storage_path: Self::default_storage_path(),
        }
    }
}

/// Normalizes a column name for case-insensitive matching.
#[must_use]
pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Parses a boolean flag the way the rest of the environment handling does.
pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
