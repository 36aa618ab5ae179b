//! Digest and record types for the duplicate store.

use crate::{Error, Result};
use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;
use std::str::FromStr;

/// Length of a row digest in bytes (SHA-256).
pub const DIGEST_LEN: usize = 32;

/// Fixed-length content digest of a canonicalized row.
///
/// Displays and parses as 64 lowercase hex characters, which is also the key
/// format of the persisted store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowDigest([u8; DIGEST_LEN]);

impl RowDigest {
    /// Wraps raw digest bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the lowercase hex encoding.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Returns the first eight hex characters, for log output.
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for RowDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for RowDigest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut bytes = [0u8; DIGEST_LEN];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| Error::InvalidInput(format!("invalid row digest '{s}': {e}")))?;
        Ok(Self(bytes))
    }
}

/// A digest together with the time it was first recorded.
///
/// `first_seen_at` never moves forward: re-recording a digest keeps the
/// original timestamp so that an overlap seen twice does not extend its own
/// lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateRecord {
    /// Content digest (map key in the store).
    pub digest: RowDigest,
    /// When the digest was first recorded (UTC).
    pub first_seen_at: DateTime<Utc>,
}

impl DuplicateRecord {
    /// Creates a new record.
    #[must_use]
    pub const fn new(digest: RowDigest, first_seen_at: DateTime<Utc>) -> Self {
        Self {
            digest,
            first_seen_at,
        }
    }

    /// Returns how long ago the record was first seen, relative to `now`.
    ///
    /// Negative when `now` is before `first_seen_at` (clock moved backwards).
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.first_seen_at
    }
}
