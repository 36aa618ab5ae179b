//! Deduplication result types.
//!
//! This module defines the values returned by the deduplication engine.

use crate::Error;
use crate::models::Row;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a single row was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowClassification {
    /// Digest not seen inside the retention window; row is kept.
    New,

    /// Digest already recorded by an earlier delivery; row is dropped.
    Duplicate,

    /// Row could not be canonicalized; kept without recording a digest.
    PassedThrough,
}

impl RowClassification {
    /// Returns the metric label for this classification.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Duplicate => "duplicate",
            Self::PassedThrough => "passed_through",
        }
    }

    /// Returns true if the row is forwarded to the caller.
    #[must_use]
    pub const fn is_kept(self) -> bool {
        !matches!(self, Self::Duplicate)
    }
}

impl std::fmt::Display for RowClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of deduplicating one delivery's rows.
///
/// `rows` holds the kept rows in their original relative order. When the
/// store could not be flushed, `flush_error` carries the cause: the rows are
/// still correct to forward, but the new digests only live in memory.
#[derive(Debug, Default)]
pub struct DeduplicationOutcome {
    /// Rows judged new (plus rows that failed canonicalization), in input order.
    pub rows: Vec<Row>,

    /// Number of input rows.
    pub total_rows: usize,

    /// Number of rows dropped as duplicates.
    pub duplicate_rows: usize,

    /// Number of rows kept because they could not be canonicalized.
    pub passed_through_rows: usize,

    /// Number of records removed from the store by this cycle's eviction.
    pub evicted: usize,

    /// Set when persisting the store failed after classification.
    pub flush_error: Option<Error>,
}

impl DeduplicationOutcome {
    /// Creates an outcome that keeps every row, without touching any store.
    #[must_use]
    pub fn pass_through(rows: Vec<Row>) -> Self {
        Self {
            total_rows: rows.len(),
            rows,
            ..Self::default()
        }
    }

    /// Returns the number of rows kept.
    #[must_use]
    pub fn unique_rows(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if at least one row was dropped.
    #[must_use]
    pub const fn has_duplicates(&self) -> bool {
        self.duplicate_rows > 0
    }

    /// Returns true if the store was flushed (or did not need to be).
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.flush_error.is_none()
    }
}

/// Result of deduplicating a raw CSV file.
#[derive(Debug, Serialize)]
pub struct CsvReport {
    /// Name of the file, for logging.
    pub source: String,

    /// Number of data rows (header excluded).
    pub total_rows: usize,

    /// Number of rows dropped as duplicates.
    pub duplicate_rows: usize,

    /// Number of rows kept.
    pub unique_rows: usize,

    /// Whether any row was dropped.
    pub has_duplicates: bool,

    /// Deduplicated CSV content (header plus kept rows).
    #[serde(skip)]
    pub content: Vec<u8>,

    /// Set when persisting the store failed.
    #[serde(skip)]
    pub flush_error: Option<Error>,
}

impl CsvReport {
    /// Creates a report that returns `content` unchanged with zero counts.
    #[must_use]
    pub fn untouched(source: &str, content: &[u8]) -> Self {
        Self {
            source: source.to_string(),
            total_rows: 0,
            duplicate_rows: 0,
            unique_rows: 0,
            has_duplicates: false,
            content: content.to_vec(),
            flush_error: None,
        }
    }
}

/// Snapshot of the engine's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeduplicationStatistics {
    /// Whether deduplication is enabled.
    pub enabled: bool,

    /// Retention window in minutes.
    pub retention_window_minutes: f64,

    /// Records in the store, including ones not yet evicted.
    pub total_stored_hashes: usize,

    /// Records still inside the window.
    pub active_hashes: usize,

    /// Backing file location.
    pub storage_path: PathBuf,
}
