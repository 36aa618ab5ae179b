//! Clear CLI command.

use crate::Result;
use crate::config::LogdedupConfig;
use crate::services::deduplication::CsvDeduplicator;

/// Empties the duplicate cache and deletes its backing file.
///
/// Returns the number of records that were dropped.
///
/// # Errors
///
/// Returns [`crate::Error::StorageWrite`] if the file cannot be removed.
pub fn execute(config: &LogdedupConfig) -> Result<usize> {
    // Load with the engine forced on so the file is read even when disabled.
    let mut dedup = CsvDeduplicator::load(config.dedup.clone().with_enabled(true));
    let dropped = dedup.store().len();
    dedup.clear_cache()?;
    Ok(dropped)
}
