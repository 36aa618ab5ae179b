//! Stats CLI command.

use super::write_error;
use crate::Result;
use crate::config::LogdedupConfig;
use crate::services::deduplication::CsvDeduplicator;
use chrono::Utc;
use std::io::Write;

/// Writes the cache statistics as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if the output cannot be written.
pub fn execute(config: &LogdedupConfig, out: &mut impl Write) -> Result<()> {
    let dedup = CsvDeduplicator::load(config.dedup.clone());
    let stats = dedup.statistics(Utc::now());

    serde_json::to_writer_pretty(&mut *out, &stats).map_err(write_error)?;
    writeln!(out).map_err(write_error)
}
