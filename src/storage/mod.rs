//! Persistence for the duplicate store.
//!
//! The store is small (one digest per row seen inside the retention window),
//! so it is kept entirely in memory and persisted as a single JSON file.

mod hash_file;

pub use hash_file::HashStoreFile;
