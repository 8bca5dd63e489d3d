//! Time entry model
//!
//! A time entry is open while `clock_out` is `None`. Closed entries always
//! satisfy `clock_out > clock_in`; `TimeEntry::validate` is checked before
//! every write and the schema carries the same CHECK constraint.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Raised when a closed entry would not end after it starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Clock out time must be after clock in time.")]
pub struct ClockOrderError;

/// A single worked interval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: i64,
    /// Owning account
    pub user_id: i64,
    pub clock_in: DateTime<Utc>,
    /// `None` while the entry is open
    pub clock_out: Option<DateTime<Utc>>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimeEntry {
    /// Open a new entry at `clock_in`
    pub fn open(user_id: i64, clock_in: DateTime<Utc>, description: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            user_id,
            clock_in,
            clock_out: None,
            description,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_open(&self) -> bool {
        self.clock_out.is_none()
    }

    /// Elapsed time; open entries are measured up to `now`
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        self.clock_out.unwrap_or(now) - self.clock_in
    }

    /// Elapsed hours, see [`TimeEntry::duration`]
    pub fn hours(&self, now: DateTime<Utc>) -> f64 {
        hours_between(self.clock_in, self.clock_out.unwrap_or(now))
    }

    /// Check the clock ordering invariant
    pub fn validate(&self) -> Result<(), ClockOrderError> {
        check_clock_order(self.clock_in, self.clock_out)
    }
}

/// `clock_out`, when present, must be strictly after `clock_in`
pub fn check_clock_order(
    clock_in: DateTime<Utc>,
    clock_out: Option<DateTime<Utc>>,
) -> Result<(), ClockOrderError> {
    match clock_out {
        Some(out) if out <= clock_in => Err(ClockOrderError),
        _ => Ok(()),
    }
}

/// Round up to a whole second. Clock times are stored without a fraction so
/// the edit form, which shows whole seconds, round-trips them unchanged.
pub fn ceil_to_second(instant: DateTime<Utc>) -> DateTime<Utc> {
    let truncated = instant.trunc_subsecs(0);
    if truncated < instant {
        truncated + Duration::seconds(1)
    } else {
        truncated
    }
}

/// Hours between two instants (seconds / 3600)
pub fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 3_600_000.0
}

/// Fields written by the create and edit forms
#[derive(Debug, Clone)]
pub struct TimeEntryInput {
    pub clock_in: DateTime<Utc>,
    pub clock_out: Option<DateTime<Utc>>,
    pub description: String,
}

/// A time entry joined with its owner's username, for staff listings
#[derive(Debug, Clone, Serialize)]
pub struct TimeEntryWithUser {
    #[serde(flatten)]
    pub entry: TimeEntry,
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, h, m, 0).unwrap()
    }

    #[test]
    fn test_closed_entry_hours() {
        let mut entry = TimeEntry::open(1, at(9, 0), String::new());
        entry.clock_out = Some(at(17, 30));

        assert!(!entry.is_open());
        assert_eq!(entry.hours(at(23, 0)), 8.5);
        assert_eq!(entry.duration(at(23, 0)), Duration::minutes(510));
    }

    #[test]
    fn test_ceil_to_second() {
        assert_eq!(ceil_to_second(at(9, 0)), at(9, 0));
        assert_eq!(ceil_to_second(at(9, 0) + Duration::nanoseconds(1)), at(9, 0) + Duration::seconds(1));
    }

    #[test]
    fn test_open_entry_measures_to_now() {
        let entry = TimeEntry::open(1, at(9, 0), String::new());

        assert!(entry.is_open());
        assert_eq!(entry.hours(at(10, 15)), 1.25);
    }

    #[test]
    fn test_validate_rejects_non_positive_span() {
        let mut entry = TimeEntry::open(1, at(9, 0), String::new());
        assert!(entry.validate().is_ok());

        entry.clock_out = Some(at(9, 0));
        assert_eq!(entry.validate(), Err(ClockOrderError));

        entry.clock_out = Some(at(8, 0));
        assert!(entry.validate().is_err());
    }

    #[test]
    fn test_clock_order_error_message() {
        assert_eq!(ClockOrderError.to_string(), "Clock out time must be after clock in time.");
    }

    #[test]
    fn test_with_user_serializes_flat() {
        let row = TimeEntryWithUser {
            entry: TimeEntry::open(3, at(9, 0), "standup".to_string()),
            username: "carol".to_string(),
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["username"], "carol");
        assert_eq!(value["description"], "standup");
        assert!(value["clock_out"].is_null());
    }

    proptest! {
        #[test]
        fn prop_hours_match_seconds(secs in 1i64..10_000_000) {
            let start = at(0, 0);
            let end = start + Duration::seconds(secs);
            let hours = hours_between(start, end);
            prop_assert!((hours - secs as f64 / 3600.0).abs() < 1e-9);
            prop_assert!(check_clock_order(start, Some(end)).is_ok());
            prop_assert!(check_clock_order(end, Some(start)).is_err());
        }
    }
}
