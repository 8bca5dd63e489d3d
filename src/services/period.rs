//! Calendar windows in the configured time zone
//!
//! Weeks start on Monday 00:00 local time and months on day 1 00:00 local
//! time. Windows are half-open `[start, end)` instants in UTC so they can be
//! compared directly with stored timestamps.

use crate::models::Period;
use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;

/// Half-open span of time `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Convert a local wall-clock time to UTC.
///
/// Ambiguous times (clocks going back) resolve to the earlier instant; times
/// skipped by a forward jump are shifted one hour later.
pub fn localize(tz: Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => match tz.from_local_datetime(&(naive + Duration::hours(1))) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
            LocalResult::None => Utc.from_utc_datetime(&naive),
        },
    }
}

/// Local midnight at the start of `date`
pub fn start_of_day(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    localize(tz, date.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// Local calendar date of an instant
pub fn local_date(tz: Tz, instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// The calendar week containing `now`
pub fn week_window(tz: Tz, now: DateTime<Utc>) -> Window {
    let today = local_date(tz, now);
    let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    Window {
        start: start_of_day(tz, monday),
        end: start_of_day(tz, monday + Duration::days(7)),
    }
}

/// The calendar month containing `now`
pub fn month_window(tz: Tz, now: DateTime<Utc>) -> Window {
    let (first, last) = month_bounds(tz, now);
    Window {
        start: start_of_day(tz, first),
        end: start_of_day(tz, last + Duration::days(1)),
    }
}

/// The window of `period` containing `now`
pub fn window_for(period: Period, tz: Tz, now: DateTime<Utc>) -> Window {
    match period {
        Period::Weekly => week_window(tz, now),
        Period::Monthly => month_window(tz, now),
    }
}

/// First and last local day of the month containing `now`
pub fn month_bounds(tz: Tz, now: DateTime<Utc>) -> (NaiveDate, NaiveDate) {
    let today = local_date(tz, now);
    let first = today.with_day(1).unwrap_or(today);
    let next_first = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    let last = next_first.map_or(today, |d| d - Duration::days(1));
    (first, last)
}

/// Window covering local days `first..=last`
pub fn date_range_window(tz: Tz, first: NaiveDate, last: NaiveDate) -> Window {
    Window {
        start: start_of_day(tz, first),
        end: start_of_day(tz, last + Duration::days(1)),
    }
}
