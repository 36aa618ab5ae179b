//! # Logdedup
//!
//! Duplicate/overlap detection for CSV log deliveries.
//!
//! Log exports arrive as fixed-duration windows that deliberately overlap the
//! previous delivery so that nothing is lost between polls. Logdedup recognises
//! rows that an earlier delivery already carried, strips them, and keeps a
//! small persistent cache of row digests so that it keeps doing so across
//! process restarts.
//!
//! ## Features
//!
//! - Content-addressed rows (SHA-256 over a canonical, column-filtered form)
//! - First-seen timestamps with a sliding retention window
//! - Crash-safe JSON persistence (temp file + rename)
//! - Fail-open error handling: internal errors never drop a new row
//!
//! ## Example
//!
//! ```rust,ignore
//! use chrono::Utc;
//! use logdedup::services::deduplication::{CsvDeduplicator, DeduplicationConfig};
//!
//! let config = DeduplicationConfig::default().with_storage_path("/var/lib/logdedup/hashes.json");
//! let mut dedup = CsvDeduplicator::load(config);
//!
//! let report = dedup.deduplicate_csv(&csv_bytes, "export-1010.csv", Utc::now());
//! upload(report.content);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use std::path::PathBuf;
use thiserror::Error as ThisError;

pub mod cli;
pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

pub use config::LogdedupConfig;
pub use models::{DuplicateRecord, Field, Row, RowDigest};
pub use services::deduplication::{
    CsvDeduplicator, DeduplicationConfig, DeduplicationOutcome, DuplicateStore,
};

/// Error type for logdedup operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When | Recovered By |
/// |---------|-------------|--------------|
/// | `StorageLoad` | Backing file exists but cannot be read or parsed | `DuplicateStore::load` (starts empty) |
/// | `StorageWrite` | Flushing the backing file fails | Surfaced to the caller |
/// | `Canonicalization` | A row value is not valid UTF-8 | `CsvDeduplicator` (row passes through as new) |
/// | `InvalidInput` | Bad configuration values or CLI input | Surfaced to the caller |
/// | `OperationFailed` | CSV, config file, or logging I/O fails | Surfaced to the caller |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The duplicate store's backing file could not be read or parsed.
    #[error("failed to load duplicate store from {}: {cause}", path.display())]
    StorageLoad {
        /// Backing file path.
        path: PathBuf,
        /// The underlying cause.
        cause: String,
    },

    /// The duplicate store could not be written to disk.
    ///
    /// The in-memory state is still valid; persistence did not happen.
    #[error("failed to write duplicate store to {}: {cause}", path.display())]
    StorageWrite {
        /// Backing file path.
        path: PathBuf,
        /// The underlying cause.
        cause: String,
    },

    /// A row could not be turned into canonical bytes.
    #[error("canonicalization failed: {0}")]
    Canonicalization(String),

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for logdedup operations.
pub type Result<T> = std::result::Result<T, Error>;
