//! Content hashing utility for deduplication.
//!
//! This module provides SHA256-based digests of canonicalized rows.
//! Collisions are not handled: two rows with the same digest are the same
//! row as far as the engine is concerned.

use super::canonical::RowCanonicalizer;
use crate::Result;
use crate::models::{DIGEST_LEN, Row, RowDigest};
use sha2::{Digest, Sha256};

/// Content hasher for deduplication.
///
/// # Example
///
/// ```rust
/// use logdedup::services::deduplication::ContentHasher;
///
/// let digest = ContentHasher::digest(b"5:login,");
/// assert_eq!(digest.to_hex().len(), 64); // SHA256 produces 64 hex chars
/// ```
pub struct ContentHasher;

impl ContentHasher {
    /// Computes the SHA256 digest of canonical bytes.
    #[must_use]
    pub fn digest(canonical: &[u8]) -> RowDigest {
        let mut hasher = Sha256::new();
        hasher.update(canonical);
        let mut bytes = [0u8; DIGEST_LEN];
        bytes.copy_from_slice(&hasher.finalize());
        RowDigest::from_bytes(bytes)
    }

    /// Canonicalizes a row and digests the result.
    ///
    /// # Errors
    ///
    /// Propagates canonicalization failures.
    pub fn digest_row(row: &Row, canonicalizer: &RowCanonicalizer) -> Result<RowDigest> {
        canonicalizer
            .canonicalize(row)
            .map(|bytes| Self::digest(&bytes))
    }
}
