//! Row canonicalization.
//!
//! Turns a row into a byte string that depends only on the row's
//! non-excluded values and their order. Excluded columns (typically capture
//! timestamps) are dropped so that the same event delivered twice with a
//! slightly different capture time canonicalizes identically.
//!
//! # Format
//!
//! Each kept value is trimmed of surrounding whitespace and written as a
//! netstring, `<decimal byte length>:<bytes>,`, in original column order.
//! Length prefixes make the encoding injective: `["a,b", "c"]` and
//! `["a", "b,c"]` produce different bytes. Column names are not part of the
//! output, so a renamed header does not invalidate the cache.

use super::config::normalize_column_name;
use crate::models::Row;
use crate::{Error, Result};
use std::collections::HashSet;

/// Canonicalizes rows against a fixed set of excluded columns.
///
/// # Example
///
/// ```rust
/// use logdedup::Row;
/// use logdedup::services::deduplication::RowCanonicalizer;
///
/// let canon = RowCanonicalizer::new(["Timestamp"]);
/// let a = Row::from_pairs([("timestamp", "10:00"), ("event", "login")]);
/// let b = Row::from_pairs([("timestamp", "10:01"), ("event", "login")]);
/// assert_eq!(canon.canonicalize(&a).unwrap(), canon.canonicalize(&b).unwrap());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RowCanonicalizer {
    excluded: HashSet<String>,
}

impl RowCanonicalizer {
    /// Creates a canonicalizer excluding the given column names.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    #[must_use]
    pub fn new<I, S>(excluded_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            excluded: excluded_columns
                .into_iter()
                .map(|c| normalize_column_name(c.as_ref()))
                .collect(),
        }
    }

    /// Returns true if the column is excluded from hashing.
    #[must_use]
    pub fn is_excluded(&self, column: &str) -> bool {
        !self.excluded.is_empty() && self.excluded.contains(&normalize_column_name(column))
    }

    /// Produces the canonical bytes for a row.
    ///
    /// A row whose every column is excluded canonicalizes to the empty byte
    /// string and is hashed like any other row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Canonicalization`] if a kept value is not valid UTF-8.
    pub fn canonicalize(&self, row: &Row) -> Result<Vec<u8>> {
        let mut out = Vec::new();

        for field in row.fields() {
            if self.is_excluded(&field.name) {
                continue;
            }

            let value = std::str::from_utf8(&field.value).map_err(|e| {
                Error::Canonicalization(format!("column '{}': {e}", field.name))
            })?;
            let value = value.trim();

            out.extend_from_slice(value.len().to_string().as_bytes());
            out.push(b':');
            out.extend_from_slice(value.as_bytes());
            out.push(b',');
        }

        Ok(out)
    }
}
