//! Deduplication orchestrator.
//!
//! Classifies each row of a delivery against the digest store, forwards
//! only rows not seen inside the retention window, and records the new
//! digests. Every cycle runs in the same order:
//!
//! 1. canonicalize and hash each row
//! 2. partition into new and duplicate, preserving order
//! 3. record the new digests at `now`
//! 4. evict stale digests relative to `now`
//! 5. flush the store
//!
//! Records that are already stale when a delivery arrives (after downtime,
//! say) are dropped before step 1, so a row returning after its window is
//! recorded with a fresh first-seen time.
//!
//! Errors fail open: a row that cannot be hashed is forwarded, and a failed
//! flush is reported alongside the (still valid) classification.

use super::batch::CsvBatch;
use super::canonical::RowCanonicalizer;
use super::config::DeduplicationConfig;
use super::evictor::{StalenessPolicy, WindowEvictor};
use super::hasher::ContentHasher;
use super::store::DuplicateStore;
use super::types::{CsvReport, DeduplicationOutcome, DeduplicationStatistics, RowClassification};
use crate::Result;
use crate::models::Row;
use chrono::{DateTime, Utc};
use tracing::instrument;

/// Removes rows already delivered inside the retention window.
///
/// Owns its [`DuplicateStore`] for the lifetime of the process. Methods that
/// mutate the store take `&mut self`, so cycles against one store are
/// serialized by construction.
///
/// `now` is always supplied by the caller.
///
/// # Example
///
/// ```rust,ignore
/// use chrono::Utc;
/// use logdedup::services::deduplication::{CsvDeduplicator, DeduplicationConfig};
///
/// let mut dedup = CsvDeduplicator::load(DeduplicationConfig::from_env());
/// let outcome = dedup.deduplicate(rows, &["timestamp"], Utc::now());
/// upload(outcome.rows);
/// ```
#[derive(Debug)]
pub struct CsvDeduplicator<P: StalenessPolicy = WindowEvictor> {
    /// Configuration.
    config: DeduplicationConfig,
    /// Digest store, exclusively owned.
    store: DuplicateStore<P>,
}

impl CsvDeduplicator<WindowEvictor> {
    /// Creates a deduplicator with an empty store (the backing file is not read).
    #[must_use]
    pub fn new(config: DeduplicationConfig) -> Self {
        let store = DuplicateStore::new(&config);
        Self { config, store }
    }

    /// Creates a deduplicator whose store is loaded from its backing file.
    #[must_use]
    pub fn load(config: DeduplicationConfig) -> Self {
        let store = DuplicateStore::load(&config);

        tracing::info!(
            enabled = config.enabled,
            detection_window_minutes = config.retention_window.as_secs() / 60,
            stored_hashes = store.len(),
            storage_path = %config.storage_path.display(),
            "Initialized duplicate detector"
        );

        Self { config, store }
    }
}

impl<P: StalenessPolicy> CsvDeduplicator<P> {
    /// Creates a deduplicator around an existing store.
    ///
    /// Used to plug in a store built with a custom [`StalenessPolicy`].
    #[must_use]
    pub const fn with_store(config: DeduplicationConfig, store: DuplicateStore<P>) -> Self {
        Self { config, store }
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &DuplicateStore<P> {
        &self.store
    }

    /// Filters a delivery's rows down to those not seen before.
    ///
    /// Returns the kept rows in input order. Rows repeated within the same
    /// delivery are all kept; only earlier deliveries count. When disabled,
    /// every row is returned and the store is left untouched. An empty input
    /// skips the evict/flush cycle.
    ///
    /// A flush failure does not discard the result: it is reported in
    /// [`DeduplicationOutcome::flush_error`] and the caller may retry with
    /// [`flush`](Self::flush).
    #[instrument(
        skip(self, rows, excluded_columns),
        fields(operation = "deduplicate", total_rows = rows.len())
    )]
    pub fn deduplicate<I, S>(
        &mut self,
        rows: Vec<Row>,
        excluded_columns: I,
        now: DateTime<Utc>,
    ) -> DeduplicationOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !self.config.enabled || rows.is_empty() {
            return DeduplicationOutcome::pass_through(rows);
        }

        let expired = self.store.evict(now);
        let canonicalizer = RowCanonicalizer::new(excluded_columns);
        let total_rows = rows.len();
        let mut kept = Vec::with_capacity(total_rows);
        let mut new_digests = Vec::with_capacity(total_rows);
        let mut duplicate_rows = 0;
        let mut passed_through_rows = 0;

        for (index, row) in rows.into_iter().enumerate() {
            let classification = match ContentHasher::digest_row(&row, &canonicalizer) {
                Ok(digest) if self.store.is_duplicate(&digest, now) => {
                    tracing::debug!(row_index = index, row_hash = %digest.short(), "Duplicate row detected");
                    RowClassification::Duplicate
                },
                Ok(digest) => {
                    new_digests.push(digest);
                    RowClassification::New
                },
                Err(e) => {
                    tracing::warn!(row_index = index, error = %e, "Row could not be canonicalized, keeping it");
                    RowClassification::PassedThrough
                },
            };

            metrics::counter!("dedup_rows_total", "outcome" => classification.as_str())
                .increment(1);

            match classification {
                RowClassification::Duplicate => duplicate_rows += 1,
                RowClassification::PassedThrough => passed_through_rows += 1,
                RowClassification::New => {},
            }
            if classification.is_kept() {
                kept.push(row);
            }
        }

        self.store.insert_many(new_digests, now);
        let evicted = expired + self.store.evict(now);
        let flush_error = self.store.flush().err();
        if let Some(e) = &flush_error {
            tracing::error!(error = %e, "Failed to save processed hashes");
        }

        DeduplicationOutcome {
            rows: kept,
            total_rows,
            duplicate_rows,
            passed_through_rows,
            evicted,
            flush_error,
        }
    }

    /// Deduplicates raw CSV content using the configured excluded columns.
    ///
    /// The first record is the header and is always kept. When disabled, or
    /// when the content cannot be parsed, the original bytes are returned
    /// unchanged with zero counts.
    #[instrument(skip(self, content), fields(operation = "deduplicate_csv", bytes = content.len()))]
    pub fn deduplicate_csv(
        &mut self,
        content: &[u8],
        source: &str,
        now: DateTime<Utc>,
    ) -> CsvReport {
        if !self.config.enabled {
            return CsvReport::untouched(source, content);
        }

        let mut batch = match CsvBatch::parse(content) {
            Ok(batch) => batch,
            Err(e) => {
                tracing::error!(source, error = %e, "Failed to detect duplicates, keeping original content");
                return CsvReport::untouched(source, content);
            },
        };

        if batch.rows().is_empty() {
            tracing::warn!(source, "Empty CSV file");
            return CsvReport::untouched(source, content);
        }

        let excluded = self.config.excluded_columns.clone();
        let outcome = self.deduplicate(batch.take_rows(), &excluded, now);
        let unique_rows = outcome.rows.len();

        batch.set_rows(outcome.rows);
        let content = match batch.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(source, error = %e, "Failed to write deduplicated CSV, keeping original content");
                content.to_vec()
            },
        };

        let report = CsvReport {
            source: source.to_string(),
            total_rows: outcome.total_rows,
            duplicate_rows: outcome.duplicate_rows,
            unique_rows,
            has_duplicates: outcome.duplicate_rows > 0,
            content,
            flush_error: outcome.flush_error,
        };

        tracing::info!(
            source,
            total_rows = report.total_rows,
            duplicate_rows = report.duplicate_rows,
            unique_rows = report.unique_rows,
            has_duplicates = report.has_duplicates,
            "Duplicate detection completed"
        );

        report
    }

    /// Retries persisting the store.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StorageWrite`] if the file cannot be written.
    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }

    /// Returns a snapshot of the engine's state at `now`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn statistics(&self, now: DateTime<Utc>) -> DeduplicationStatistics {
        DeduplicationStatistics {
            enabled: self.config.enabled,
            retention_window_minutes: self.config.retention_window.as_secs_f64() / 60.0,
            total_stored_hashes: self.store.len(),
            active_hashes: self.store.active_count(now),
            storage_path: self.config.storage_path.clone(),
        }
    }

    /// Forgets every recorded digest and deletes the backing file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StorageWrite`] if the file cannot be removed.
    pub fn clear_cache(&mut self) -> Result<()> {
        self.store.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DuplicateRecord, Field};
    use chrono::{TimeDelta, TimeZone};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    const NO_EXCLUSIONS: [&str; 0] = [];

    fn config(dir: &TempDir) -> DeduplicationConfig {
        DeduplicationConfig::default()
            .with_storage_path(dir.path().join("hashes.json"))
            .with_retention_window(Duration::from_secs(15 * 60))
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
    }

    fn event_row(minute: u32, event: &str) -> Row {
        Row::from_pairs([
            ("timestamp", format!("2024-01-01 10:{minute:02}:00")),
            ("event", event.to_string()),
        ])
    }

    #[test]
    fn test_first_delivery_keeps_everything() {
        let dir = TempDir::new().unwrap();
        let mut dedup = CsvDeduplicator::new(config(&dir));
        let rows = vec![event_row(0, "a"), event_row(1, "b")];

        let outcome = dedup.deduplicate(rows.clone(), NO_EXCLUSIONS, t0());

        assert_eq!(outcome.rows, rows);
        assert_eq!(outcome.duplicate_rows, 0);
        assert_eq!(dedup.store().len(), 2);
        assert!(outcome.is_persisted());
    }

    #[test]
    fn test_second_delivery_drops_seen_rows_in_order() {
        let dir = TempDir::new().unwrap();
        let mut dedup = CsvDeduplicator::new(config(&dir));
        dedup.deduplicate(vec![event_row(0, "a"), event_row(1, "b")], NO_EXCLUSIONS, t0());

        let second = vec![event_row(1, "b"), event_row(2, "c"), event_row(0, "a"), event_row(3, "d")];
        let outcome = dedup.deduplicate(second, NO_EXCLUSIONS, t0() + TimeDelta::minutes(1));

        assert_eq!(outcome.rows, vec![event_row(2, "c"), event_row(3, "d")]);
        assert_eq!(outcome.duplicate_rows, 2);
        assert!(outcome.has_duplicates());
    }

    #[test]
    fn test_excluded_columns_make_recaptured_rows_duplicates() {
        let dir = TempDir::new().unwrap();
        let mut dedup = CsvDeduplicator::new(config(&dir));
        dedup.deduplicate(vec![event_row(0, "login")], ["timestamp"], t0());

        let outcome = dedup.deduplicate(vec![event_row(5, "login")], ["Timestamp"], t0());

        assert!(outcome.rows.is_empty());
        assert_eq!(outcome.duplicate_rows, 1);
    }

    #[test]
    fn test_repeats_within_one_delivery_are_kept() {
        let dir = TempDir::new().unwrap();
        let mut dedup = CsvDeduplicator::new(config(&dir));
        let rows = vec![event_row(1, "x"), event_row(1, "x")];

        let outcome = dedup.deduplicate(rows, NO_EXCLUSIONS, t0());

        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(dedup.store().len(), 1);
    }

    #[test]
    fn test_uncanonicalizable_row_passes_through() {
        let dir = TempDir::new().unwrap();
        let mut dedup = CsvDeduplicator::new(config(&dir));
        let bad = Row::new(vec![Field::new("event", vec![0xff])]);

        dedup.deduplicate(vec![bad.clone()], NO_EXCLUSIONS, t0());
        let outcome = dedup.deduplicate(vec![bad.clone()], NO_EXCLUSIONS, t0());

        assert_eq!(outcome.rows, vec![bad]);
        assert_eq!(outcome.passed_through_rows, 1);
        assert!(dedup.store().is_empty());
    }

    #[test]
    fn test_empty_input() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        let mut dedup = CsvDeduplicator::new(cfg.clone());

        let outcome = dedup.deduplicate(Vec::new(), NO_EXCLUSIONS, t0());

        assert!(outcome.rows.is_empty());
        assert!(outcome.is_persisted());
        assert!(!cfg.storage_path.exists());
    }

    #[test]
    fn test_disabled_returns_input_and_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir).with_enabled(false);
        let mut dedup = CsvDeduplicator::new(cfg.clone());
        let rows = vec![event_row(0, "a"), event_row(0, "a")];

        dedup.deduplicate(rows.clone(), NO_EXCLUSIONS, t0());
        let outcome = dedup.deduplicate(rows.clone(), NO_EXCLUSIONS, t0());

        assert_eq!(outcome.rows, rows);
        assert!(!cfg.storage_path.exists());
    }

    #[test]
    fn test_expired_rows_are_new_again() {
        let dir = TempDir::new().unwrap();
        let mut dedup = CsvDeduplicator::new(config(&dir));
        dedup.deduplicate(vec![event_row(0, "a")], NO_EXCLUSIONS, t0());

        let outcome = dedup.deduplicate(
            vec![event_row(0, "a")],
            NO_EXCLUSIONS,
            t0() + TimeDelta::minutes(16),
        );

        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.evicted, 1);
        // Re-recorded with the new first-seen time.
        assert_eq!(dedup.store().len(), 1);
    }

    /// Expires records after one minute whatever the configured window.
    #[derive(Debug)]
    struct OneMinutePolicy;

    impl StalenessPolicy for OneMinutePolicy {
        fn is_stale(&self, record: &DuplicateRecord, now: DateTime<Utc>, _window: TimeDelta) -> bool {
            record.age(now) > TimeDelta::minutes(1)
        }
    }

    #[test]
    fn test_custom_staleness_policy() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        let store = DuplicateStore::with_policy(&cfg, OneMinutePolicy);
        let mut dedup = CsvDeduplicator::with_store(cfg, store);
        dedup.deduplicate(vec![event_row(0, "a")], NO_EXCLUSIONS, t0());

        let inside = dedup.deduplicate(vec![event_row(0, "a")], NO_EXCLUSIONS, t0() + TimeDelta::minutes(1));
        assert!(inside.rows.is_empty());

        let after = dedup.deduplicate(vec![event_row(0, "a")], NO_EXCLUSIONS, t0() + TimeDelta::minutes(2));
        assert_eq!(after.rows.len(), 1);
        assert_eq!(after.evicted, 1);
    }

    #[test]
    fn test_flush_failure_keeps_classification() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let cfg = config(&dir).with_storage_path(blocker.join("hashes.json"));
        let mut dedup = CsvDeduplicator::new(cfg);

        let outcome = dedup.deduplicate(vec![event_row(0, "a")], NO_EXCLUSIONS, t0());

        assert_eq!(outcome.rows.len(), 1);
        assert!(matches!(
            outcome.flush_error,
            Some(crate::Error::StorageWrite { .. })
        ));
        assert!(dedup.flush().is_err());
    }

    #[test]
    fn test_state_survives_restart() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        {
            let mut dedup = CsvDeduplicator::load(cfg.clone());
            dedup.deduplicate(vec![event_row(0, "a")], NO_EXCLUSIONS, t0());
        }

        let mut restarted = CsvDeduplicator::load(cfg);
        let outcome = restarted.deduplicate(
            vec![event_row(0, "a"), event_row(1, "b")],
            NO_EXCLUSIONS,
            t0() + TimeDelta::minutes(5),
        );

        assert_eq!(outcome.rows, vec![event_row(1, "b")]);
    }

    #[test]
    fn test_deduplicate_csv() {
        let dir = TempDir::new().unwrap();
        let mut dedup = CsvDeduplicator::new(config(&dir));
        let content = b"timestamp,event,value\n\
2024-01-01 10:00:00,login,user1\n\
2024-01-01 10:01:00,logout,user1\n\
2024-01-01 10:01:00,logout,user1\n\
2024-01-01 10:02:00,login,user2\n";

        let first = dedup.deduplicate_csv(content, "test.csv", t0());
        assert_eq!(first.total_rows, 4);
        assert_eq!(first.duplicate_rows, 0);
        assert_eq!(first.unique_rows, 4);
        assert!(!first.has_duplicates);

        let second = dedup.deduplicate_csv(content, "test2.csv", t0());
        assert_eq!(second.total_rows, 4);
        assert_eq!(second.duplicate_rows, 4);
        assert_eq!(second.unique_rows, 0);
        assert!(second.has_duplicates);
        assert_eq!(second.content, b"timestamp,event,value\n");
    }

    #[test]
    fn test_deduplicate_csv_empty_and_disabled() {
        let dir = TempDir::new().unwrap();
        let mut dedup = CsvDeduplicator::new(config(&dir));
        let empty = dedup.deduplicate_csv(b"", "empty.csv", t0());
        assert_eq!(empty.total_rows, 0);
        assert!(empty.content.is_empty());

        let mut disabled = CsvDeduplicator::new(config(&dir).with_enabled(false));
        let content = b"col1,col2\nvalue1,value2\nvalue1,value2";
        let report = disabled.deduplicate_csv(content, "test.csv", t0());
        assert_eq!(report.content, content);
        assert_eq!(report.total_rows, 0);
    }

    #[test]
    fn test_deduplicate_csv_invalid_utf8_fails_open() {
        let dir = TempDir::new().unwrap();
        let mut dedup = CsvDeduplicator::new(config(&dir));
        let content = b"event\n\xff\xfe\n";

        dedup.deduplicate_csv(content, "invalid.csv", t0());
        let report = dedup.deduplicate_csv(content, "invalid.csv", t0());

        assert_eq!(report.unique_rows, 1);
        assert_eq!(report.content, content);
    }

    #[test]
    fn test_deduplicate_csv_keeps_raw_header_and_line_endings() {
        let dir = TempDir::new().unwrap();
        let mut dedup = CsvDeduplicator::new(config(&dir));
        let first = b"Ger\xe4t,event\r\nA,login\r\n";
        let second = b"Ger\xe4t,event\r\nA,login\r\nB,logout\r\n";

        let report = dedup.deduplicate_csv(first, "latin1.csv", t0());
        assert_eq!(report.content, first);

        let report = dedup.deduplicate_csv(second, "latin1.csv", t0());
        assert_eq!(report.duplicate_rows, 1);
        assert_eq!(report.content, b"Ger\xe4t,event\r\nB,logout\r\n");
    }

    #[test]
    fn test_statistics_and_clear() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir).with_retention_window(Duration::from_secs(5 * 60));
        let mut dedup = CsvDeduplicator::new(cfg.clone());

        let stats = dedup.statistics(t0());
        assert!(stats.enabled);
        assert!((stats.retention_window_minutes - 5.0).abs() < f64::EPSILON);
        assert_eq!(stats.total_stored_hashes, 0);
        assert_eq!(stats.storage_path, cfg.storage_path);

        dedup.deduplicate_csv(b"col1,col2\nvalue1,value2", "test.csv", t0());
        assert_eq!(dedup.statistics(t0()).total_stored_hashes, 1);
        assert_eq!(dedup.statistics(t0() + TimeDelta::minutes(6)).active_hashes, 0);

        dedup.clear_cache().unwrap();
        assert_eq!(dedup.statistics(t0()).total_stored_hashes, 0);
        assert!(!cfg.storage_path.exists());
    }
}
