//! Data models for logdedup.
//!
//! This module contains the row and record types shared by the
//! deduplication engine, its persistence layer, and the CLI.

mod record;
mod row;

pub use record::{DIGEST_LEN, DuplicateRecord, RowDigest};
pub use row::{Field, Row};
