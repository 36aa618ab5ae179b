//! CLI command implementations.
//!
//! Each submodule implements one `logdedup` subcommand. Commands write their
//! primary output to a caller-supplied writer so the binary owns stdout.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dedup` | Strip previously delivered rows from a CSV file |
//! | `stats` | Print cache statistics as JSON |
//! | `clear` | Forget every recorded row and delete the cache file |
//!
//! # Example Usage
//!
//! ```bash
//! # Deduplicate a delivery, writing the result to a file
//! logdedup dedup export-1010.csv --output upload/export-1010.csv
//!
//! # Inspect the cache
//! logdedup stats
//! ```

pub mod clear;
pub mod dedup;
pub mod stats;

use crate::Error;

/// Maps an output write failure to a crate error.
pub(crate) fn write_error(e: impl ToString) -> Error {
    Error::OperationFailed {
        operation: "write_output".to_string(),
        cause: e.to_string(),
    }
}
