//! Time-windowed duplicate row detection.
//!
//! Overlapping log deliveries repeat rows from the previous window. This
//! module recognizes those rows by content and strips them:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        CsvDeduplicator                           │
//! │  ┌──────────────────┐  ┌───────────────┐  ┌───────────────────┐  │
//! │  │ RowCanonicalizer │─▶│ ContentHasher │─▶│ DuplicateStore<P> │  │
//! │  │                  │  │               │  │                   │  │
//! │  │ drop excluded    │  │ SHA-256       │  │ digest → first    │  │
//! │  │ columns, frame   │  │ digest        │  │ seen, JSON file,  │  │
//! │  │ as netstrings    │  │               │  │ P: StalenessPolicy│  │
//! │  └──────────────────┘  └───────────────┘  └───────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each cycle classifies rows, records new digests, evicts digests older
//! than the retention window, and flushes the store atomically.
//!
//! # Example
//!
//! ```rust,ignore
//! use chrono::Utc;
//! use logdedup::services::deduplication::{CsvDeduplicator, DeduplicationConfig};
//!
//! let mut dedup = CsvDeduplicator::load(DeduplicationConfig::from_env());
//!
//! let report = dedup.deduplicate_csv(&content, "export.csv", Utc::now());
//! if report.has_duplicates {
//!     tracing::info!(removed = report.duplicate_rows, "Stripped overlap");
//! }
//! ```

mod batch;
mod canonical;
mod config;
mod evictor;
mod hasher;
mod service;
mod store;
mod types;

pub use batch::{CsvBatch, LineEnding};
pub use canonical::RowCanonicalizer;
pub use config::{
    DEFAULT_EXCLUDED_COLUMNS, DEFAULT_RETENTION_WINDOW, DeduplicationConfig, ENABLED_ENV,
    EXCLUDED_COLUMNS_ENV, STORAGE_PATH_ENV, STORE_FILE_NAME, WINDOW_MINUTES_ENV,
    normalize_column_name,
};
pub use evictor::{StalenessPolicy, WindowEvictor};
pub use hasher::ContentHasher;
pub use service::CsvDeduplicator;
pub use store::DuplicateStore;
pub use types::{CsvReport, DeduplicationOutcome, DeduplicationStatistics, RowClassification};
