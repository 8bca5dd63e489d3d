//! Time entry and clock-in forms

use super::{FormErrors, REQUIRED};
use crate::models::{ceil_to_second, check_clock_order, TimeEntry, TimeEntryInput};
use crate::services::period::localize;
use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub const INVALID_DATETIME: &str = "Enter a valid date/time.";

const INPUT_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse a `datetime-local` style value as wall-clock time in `tz`
pub fn parse_local_datetime(value: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let value = value.trim();
    INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| localize(tz, naive))
}

fn format_local(instant: DateTime<Utc>, tz: Tz) -> String {
    let local = instant.with_timezone(&tz);
    if local.second() == 0 {
        local.format("%Y-%m-%dT%H:%M").to_string()
    } else {
        local.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

/// Create/edit form. Values stay as submitted text so they can be re-rendered.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TimeEntryForm {
    #[serde(default)]
    pub clock_in: String,
    #[serde(default)]
    pub clock_out: String,
    #[serde(default)]
    pub description: String,
}

impl TimeEntryForm {
    /// Prefill from a stored entry. Fractions of a second are dropped from
    /// the start and rounded up on the end, so saving unchanged stays valid.
    pub fn from_entry(entry: &TimeEntry, tz: Tz) -> Self {
        Self {
            clock_in: format_local(entry.clock_in, tz),
            clock_out: entry
                .clock_out
                .map(|out| format_local(ceil_to_second(out), tz))
                .unwrap_or_default(),
            description: entry.description.clone(),
        }
    }

    pub fn validate(&self, tz: Tz) -> Result<TimeEntryInput, FormErrors> {
        let mut errors = FormErrors::new();

        let clock_in = if self.clock_in.trim().is_empty() {
            errors.add("clock_in", REQUIRED);
            None
        } else {
            let parsed = parse_local_datetime(&self.clock_in, tz);
            if parsed.is_none() {
                errors.add("clock_in", INVALID_DATETIME);
            }
            parsed
        };

        let clock_out = if self.clock_out.trim().is_empty() {
            None
        } else {
            let parsed = parse_local_datetime(&self.clock_out, tz);
            if parsed.is_none() {
                errors.add("clock_out", INVALID_DATETIME);
            }
            parsed
        };

        if let Some(start) = clock_in {
            if let Err(e) = check_clock_order(start, clock_out) {
                errors.add_non_field(e.to_string());
            }
        }

        match clock_in {
            Some(clock_in) if errors.is_empty() => Ok(TimeEntryInput {
                clock_in,
                clock_out,
                description: self.description.trim().to_string(),
            }),
            _ => Err(errors),
        }
    }
}

/// Clock-in form; the description is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClockInForm {
    #[serde(default)]
    pub description: Option<String>,
}

impl ClockInForm {
    pub fn description(&self) -> String {
        self.description
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    }
}
