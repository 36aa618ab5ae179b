//! Configuration management.
//!
//! Configuration is assembled once at startup from, in increasing priority:
//! built-in defaults, an optional TOML file, then `LOGDEDUP_*` environment
//! variables. The result is an immutable value handed to the engine.
//!
//! ```toml
//! data_dir = "/var/lib/logdedup"
//!
//! [dedup]
//! enabled = true
//! window_minutes = 15
//! excluded_columns = ["timestamp", "received_at"]
//!
//! [logging]
//! format = "json"
//! level = "debug"
//! file = "/var/log/logdedup.log"
//! ```

use crate::services::deduplication::{DeduplicationConfig, STORE_FILE_NAME};
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "LOGDEDUP_CONFIG_PATH";

/// Main configuration for logdedup.
#[derive(Debug, Clone)]
pub struct LogdedupConfig {
    /// Path to the data directory.
    pub data_dir: PathBuf,
    /// Deduplication engine configuration.
    pub dedup: DeduplicationConfig,
    /// Logging settings, resolved by [`crate::observability::LoggingConfig`].
    pub logging: LoggingSettings,
}

/// Logging section of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoggingSettings {
    /// Output format: "pretty" or "json".
    pub format: Option<String>,
    /// Default filter directive, e.g. "info" or `logdedup=debug`.
    pub level: Option<String>,
    /// Append logs to this file instead of stderr.
    pub file: Option<PathBuf>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Data directory.
    pub data_dir: Option<String>,
    /// Deduplication section.
    pub dedup: Option<ConfigFileDedup>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
}

/// Deduplication section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileDedup {
    /// Master switch.
    pub enabled: Option<bool>,
    /// Retention window in minutes.
    pub window_minutes: Option<u64>,
    /// Columns excluded from hashing. Replaces the default list.
    pub excluded_columns: Option<Vec<String>>,
    /// Backing file path. Defaults to `<data_dir>/processed_data_hashes.json`.
    pub storage_path: Option<String>,
}

impl Default for LogdedupConfig {
    fn default() -> Self {
        let dedup = DeduplicationConfig::default();
        let data_dir = dedup
            .storage_path
            .parent()
            .map_or_else(|| PathBuf::from(".logdedup"), Path::to_path_buf);

        Self {
            data_dir,
            dedup,
            logging: LoggingSettings::default(),
        }
    }
}

impl LogdedupConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or holds an
    /// invalid value.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        let config = Self::from_toml(&contents)?.with_env_overrides();
        tracing::debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the platform config dir (`~/.config/logdedup/config.toml` on
    /// Linux). Returns defaults with environment overrides if no readable
    /// file is found; see [`load_or_default`](Self::load_or_default).
    #[must_use]
    pub fn load_default() -> (Self, Option<Error>) {
        let candidate = directories::ProjectDirs::from("", "", "logdedup")
            .map(|dirs| dirs.config_dir().join("config.toml"));

        Self::load_or_default(candidate.as_deref())
    }

    /// Loads `path` if it exists, falling back to defaults.
    ///
    /// A file that exists but cannot be loaded is skipped; its error is
    /// returned alongside the defaults so the caller can report it once
    /// logging is up.
    #[must_use]
    pub fn load_or_default(path: Option<&Path>) -> (Self, Option<Error>) {
        match path.filter(|p| p.exists()).map(Self::load_from_file) {
            Some(Ok(config)) => (config, None),
            Some(Err(e)) => (Self::default().with_env_overrides(), Some(e)),
            None => (Self::default().with_env_overrides(), None),
        }
    }

    /// Parses TOML configuration text without consulting the environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] on malformed TOML and
    /// [`Error::InvalidInput`] on invalid values.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;

        Self::from_config_file(file)
    }

    /// Converts a `ConfigFile` to `LogdedupConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(data_dir) = file.data_dir {
            config = config.with_data_dir(non_blank("data_dir", &data_dir)?);
        }
        if let Some(dedup) = file.dedup {
            if let Some(enabled) = dedup.enabled {
                config.dedup.enabled = enabled;
            }
            if let Some(minutes) = dedup.window_minutes {
                config.dedup.retention_window = Duration::from_secs(minutes.saturating_mul(60));
            }
            if let Some(columns) = dedup.excluded_columns {
                config.dedup = config.dedup.with_excluded_columns(columns);
            }
            if let Some(path) = dedup.storage_path {
                config.dedup.storage_path = PathBuf::from(non_blank("dedup.storage_path", &path)?);
            }
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }

        Ok(config)
    }

    /// Applies `LOGDEDUP_DEDUP_*` environment overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        self.dedup = self.dedup.with_env_overrides();
        self
    }

    /// Sets the data directory and points the backing file inside it.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self.dedup.storage_path = self.data_dir.join(STORE_FILE_NAME);
        self
    }

    /// Overrides the backing file path.
    #[must_use]
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dedup.storage_path = path.into();
        self
    }
}

fn non_blank<'a>(key: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(format!("{key} must not be empty")));
    }
    Ok(trimmed)
}
