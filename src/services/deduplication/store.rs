//! Persistent digest store.
//!
//! Maps row digests to the time they were first seen. The store is loaded
//! once at startup, mutated once per delivery, and flushed after every
//! mutation batch. Loading is best effort: a missing or unreadable file
//! yields an empty store, which can only cause re-uploads, never lost rows.

use super::config::DeduplicationConfig;
use super::evictor::{StalenessPolicy, WindowEvictor};
use crate::Result;
use crate::models::{DuplicateRecord, RowDigest};
use crate::storage::HashStoreFile;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::path::Path;
use tracing::instrument;

/// Persistent mapping from row digest to first-seen time.
///
/// When disabled, every operation is a no-op and [`contains`](Self::contains)
/// always reports "not a duplicate".
///
/// The store is not internally synchronized. Mutating methods take
/// `&mut self`, and only one store may own a given backing file.
///
/// # Example
///
/// ```rust,ignore
/// use chrono::Utc;
/// use logdedup::services::deduplication::{DeduplicationConfig, DuplicateStore};
///
/// let mut store = DuplicateStore::load(&DeduplicationConfig::default());
/// let now = Utc::now();
/// store.insert_many([digest], now);
/// store.evict(now);
/// store.flush()?;
/// ```
#[derive(Debug)]
pub struct DuplicateStore<P: StalenessPolicy = WindowEvictor> {
    records: HashMap<RowDigest, DuplicateRecord>,
    retention_window: TimeDelta,
    enabled: bool,
    file: HashStoreFile,
    policy: P,
}

impl DuplicateStore<WindowEvictor> {
    /// Creates an empty store without reading the backing file.
    #[must_use]
    pub fn new(config: &DeduplicationConfig) -> Self {
        Self::with_policy(config, WindowEvictor)
    }

    /// Creates a store from its backing file.
    ///
    /// Starts empty when the file is absent, and logs a warning and starts
    /// empty when it cannot be parsed. Never fails. A disabled store does
    /// not read the file.
    #[must_use]
    pub fn load(config: &DeduplicationConfig) -> Self {
        Self::load_with_policy(config, WindowEvictor)
    }
}

impl<P: StalenessPolicy> DuplicateStore<P> {
    /// Creates an empty store with a custom staleness policy.
    #[must_use]
    pub fn with_policy(config: &DeduplicationConfig, policy: P) -> Self {
        Self {
            records: HashMap::new(),
            retention_window: TimeDelta::from_std(config.retention_window)
                .unwrap_or(TimeDelta::MAX),
            enabled: config.enabled,
            file: HashStoreFile::new(&config.storage_path),
            policy,
        }
    }

    /// Loads a store with a custom staleness policy.
    ///
    /// See [`DuplicateStore::load`].
    #[must_use]
    pub fn load_with_policy(config: &DeduplicationConfig, policy: P) -> Self {
        let mut store = Self::with_policy(config, policy);
        if !store.enabled {
            return store;
        }

        match store.file.read() {
            Ok(Some(records)) => {
                tracing::debug!(
                    path = %store.file.path().display(),
                    stored_hashes = records.len(),
                    "Loaded processed hashes from disk"
                );
                store.records = records;
            },
            Ok(None) => {
                tracing::debug!(
                    path = %store.file.path().display(),
                    "No duplicate store on disk, starting empty"
                );
            },
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load processed hashes, starting fresh");
                metrics::counter!("dedup_store_load_failures_total").increment(1);
            },
        }

        store.report_size();
        store
    }

    /// Returns true if the digest is stored. Always false when disabled.
    #[must_use]
    pub fn contains(&self, digest: &RowDigest) -> bool {
        self.enabled && self.records.contains_key(digest)
    }

    /// Returns true if the digest is stored and not yet stale at `now`.
    ///
    /// Records that outlived the window but have not been evicted yet (for
    /// example, loaded after downtime) do not count as duplicates.
    #[must_use]
    pub fn is_duplicate(&self, digest: &RowDigest, now: DateTime<Utc>) -> bool {
        self.enabled
            && self
                .records
                .get(digest)
                .is_some_and(|r| !self.policy.is_stale(r, now, self.retention_window))
    }

    /// Returns the stored record for a digest.
    #[must_use]
    pub fn get(&self, digest: &RowDigest) -> Option<&DuplicateRecord> {
        self.records.get(digest)
    }

    /// Records digests as first seen at `now`.
    ///
    /// Digests already present keep their original timestamp. Returns the
    /// number of digests newly added.
    pub fn insert_many<I>(&mut self, digests: I, now: DateTime<Utc>) -> usize
    where
        I: IntoIterator<Item = RowDigest>,
    {
        if !self.enabled {
            return 0;
        }

        let before = self.records.len();
        for digest in digests {
            self.records
                .entry(digest)
                .or_insert_with(|| DuplicateRecord::new(digest, now));
        }
        let inserted = self.records.len() - before;

        self.report_size();
        inserted
    }

    /// Removes every record the staleness policy rejects at `now`.
    ///
    /// Returns the number of records removed.
    #[instrument(skip(self), fields(operation = "evict"))]
    pub fn evict(&mut self, now: DateTime<Utc>) -> usize {
        if !self.enabled || self.records.is_empty() {
            return 0;
        }

        let window = self.retention_window;
        let before = self.records.len();
        self.records
            .retain(|_, record| !self.policy.is_stale(record, now, window));
        let evicted = before - self.records.len();

        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.records.len(), "Cleaned up expired row hashes");
            metrics::counter!("dedup_evicted_total").increment(evicted as u64);
            self.report_size();
        }

        evicted
    }

    /// Writes the full record set to the backing file atomically.
    ///
    /// No-op when disabled.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StorageWrite`] if the file cannot be written.
    /// The in-memory state is unaffected; the caller decides whether to retry.
    #[instrument(skip(self), fields(operation = "flush", records = self.records.len()))]
    pub fn flush(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        self.file.write(self.records.values())?;
        tracing::debug!(path = %self.file.path().display(), "Flushed duplicate store");
        Ok(())
    }

    /// Drops all records and deletes the backing file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StorageWrite`] if the file cannot be removed.
    pub fn clear(&mut self) -> Result<()> {
        self.records.clear();
        self.report_size();
        self.file.remove()?;
        tracing::info!(path = %self.file.path().display(), "Cleared duplicate detection cache");
        Ok(())
    }

    /// Returns the number of stored records, stale or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the number of records still inside the window at `now`.
    #[must_use]
    pub fn active_count(&self, now: DateTime<Utc>) -> usize {
        self.records
            .values()
            .filter(|r| !self.policy.is_stale(r, now, self.retention_window))
            .count()
    }

    /// Iterates over all stored records in arbitrary order.
    pub fn records(&self) -> impl Iterator<Item = &DuplicateRecord> {
        self.records.values()
    }

    /// Returns the retention window.
    #[must_use]
    pub const fn retention_window(&self) -> TimeDelta {
        self.retention_window
    }

    /// Returns whether the store is enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn storage_path(&self) -> &Path {
        self.file.path()
    }

    #[allow(clippy::cast_precision_loss)]
    fn report_size(&self) {
        metrics::gauge!("dedup_store_size").set(self.records.len() as f64);
    }
}
