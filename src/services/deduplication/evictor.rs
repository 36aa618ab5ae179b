//! Staleness policy for stored digests.
//!
//! The store asks the policy which records have aged out; the policy owns
//! no state of its own. Swapping the policy (for example, for session-based
//! windows) does not touch storage or persistence.

use crate::models::DuplicateRecord;
use chrono::{DateTime, TimeDelta, Utc};

/// Decides whether a record is stale.
pub trait StalenessPolicy {
    /// Returns true if `record` should no longer suppress duplicates at `now`.
    fn is_stale(&self, record: &DuplicateRecord, now: DateTime<Utc>, window: TimeDelta) -> bool;
}

/// Fixed-duration window, measured from first sighting.
///
/// The boundary is exclusive: a record whose age equals the window is kept,
/// a record strictly older is stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowEvictor;

impl StalenessPolicy for WindowEvictor {
    fn is_stale(&self, record: &DuplicateRecord, now: DateTime<Utc>, window: TimeDelta) -> bool {
        record.age(now) > window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RowDigest;
    use chrono::TimeZone;
    use test_case::test_case;

    fn record_at(first_seen_at: DateTime<Utc>) -> DuplicateRecord {
        DuplicateRecord::new(RowDigest::from_bytes([7; 32]), first_seen_at)
    }

    #[test_case(TimeDelta::minutes(15) - TimeDelta::milliseconds(1), false; "just inside window")]
    #[test_case(TimeDelta::minutes(15), false; "exactly window")]
    #[test_case(TimeDelta::minutes(15) + TimeDelta::milliseconds(1), true; "just past window")]
    #[test_case(TimeDelta::zero(), false; "fresh")]
    #[test_case(TimeDelta::minutes(-5), false; "clock went backwards")]
    fn test_window_boundary(age: TimeDelta, expected: bool) {
        let seen = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let record = record_at(seen);
        assert_eq!(
            WindowEvictor.is_stale(&record, seen + age, TimeDelta::minutes(15)),
            expected
        );
    }
}
