//! Dedup CLI command.

use super::write_error;
use crate::config::LogdedupConfig;
use crate::services::deduplication::{CsvDeduplicator, CsvReport, StalenessPolicy};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

/// Input path meaning "read from stdin".
pub const STDIN_PATH: &str = "-";

/// Deduplicates `input` and writes the kept rows to `output` (stdout when `None`).
///
/// The report is returned even when persisting the cache failed; check
/// [`CsvReport::flush_error`].
///
/// # Errors
///
/// Returns an error if the input cannot be read or the output cannot be written.
pub fn execute(config: &LogdedupConfig, input: &Path, output: Option<&Path>) -> Result<CsvReport> {
    let mut dedup = CsvDeduplicator::load(config.dedup.clone());
    let report = run(&mut dedup, input, Utc::now())?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(write_error)?;
            }
            fs::write(path, &report.content).map_err(write_error)?;
        },
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&report.content).map_err(write_error)?;
            stdout.flush().map_err(write_error)?;
        },
    }

    Ok(report)
}

/// Reads `input` and runs it through `dedup`.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if the input cannot be read.
pub fn run<P: StalenessPolicy>(
    dedup: &mut CsvDeduplicator<P>,
    input: &Path,
    now: DateTime<Utc>,
) -> Result<CsvReport> {
    let content = read_input(input)?;
    let source = input
        .file_name()
        .map_or_else(|| "stdin".to_string(), |n| n.to_string_lossy().into_owned());

    Ok(dedup.deduplicate_csv(&content, &source, now))
}

/// Formats the one-line summary printed after a run.
#[must_use]
pub fn summary(report: &CsvReport) -> String {
    format!(
        "{}: {} rows, {} duplicates removed, {} kept",
        report.source, report.total_rows, report.duplicate_rows, report.unique_rows
    )
}

fn read_input(input: &Path) -> Result<Vec<u8>> {
    let read_error = |e: io::Error| Error::OperationFailed {
        operation: "read_input".to_string(),
        cause: format!("{}: {e}", input.display()),
    };

    if input.as_os_str() == STDIN_PATH {
        let mut content = Vec::new();
        io::stdin().lock().read_to_end(&mut content).map_err(read_error)?;
        return Ok(content);
    }

    fs::read(input).map_err(read_error)
}
