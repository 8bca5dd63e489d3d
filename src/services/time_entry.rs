//! Time entry service
//!
//! Per-account state machine: an account is idle or has exactly one open
//! entry. Clock-in opens an entry, clock-out closes it; the create/edit forms
//! may write arbitrary (valid) times. The open-entry constraint in the schema
//! catches concurrent clock-ins that pass the friendly pre-check.

use crate::db::is_unique_violation;
use crate::db::repositories::time_entry::EntryFilter;
use crate::db::repositories::TimeEntryRepository;
use crate::models::{ceil_to_second, check_clock_order, ClockOrderError, TimeEntry, TimeEntryInput, TimeEntryWithUser};
use crate::services::period::{month_window, week_window, Window};
use anyhow::Context;
use chrono::{DateTime, SubsecRound, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;

/// Number of entries listed on the personal dashboard
pub const DASHBOARD_RECENT_ENTRIES: i64 = 10;

/// Error types for time entry operations
#[derive(Debug, thiserror::Error)]
pub enum TimeEntryServiceError {
    #[error("You already have an active time entry. Please clock out first.")]
    AlreadyClockedIn,

    /// Another entry of the same account is still open
    #[error("You already have an active time entry. Close it before adding another open entry.")]
    OpenEntryExists,

    #[error("Time entry not found")]
    NotFound,

    #[error(transparent)]
    InvalidTimes(#[from] ClockOrderError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Everything the personal dashboard shows
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub active_entry: Option<TimeEntry>,
    pub week: Window,
    pub month: Window,
    /// Hours of closed entries clocked in this week
    pub week_hours: f64,
    /// Hours of closed entries clocked in this month
    pub month_hours: f64,
    pub recent_entries: Vec<TimeEntry>,
}

/// Time entry service
pub struct TimeEntryService {
    repo: Arc<dyn TimeEntryRepository>,
    tz: Tz,
}

impl TimeEntryService {
    pub fn new(repo: Arc<dyn TimeEntryRepository>, tz: Tz) -> Self {
        Self { repo, tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Open a new entry at `now`
    pub async fn clock_in(
        &self,
        user_id: i64,
        description: String,
        now: DateTime<Utc>,
    ) -> Result<TimeEntry, TimeEntryServiceError> {
        if self
            .repo
            .get_open_for_user(user_id)
            .await
            .context("Failed to check for open entry")?
            .is_some()
        {
            return Err(TimeEntryServiceError::AlreadyClockedIn);
        }

        let clock_in = now.trunc_subsecs(0);
        match self.repo.create(&TimeEntry::open(user_id, clock_in, description)).await {
            Ok(entry) => {
                tracing::info!(user_id, entry_id = entry.id, "Clocked in");
                Ok(entry)
            }
            Err(e) if is_unique_violation(&e) => Err(TimeEntryServiceError::AlreadyClockedIn),
            Err(e) => Err(e.into()),
        }
    }

    /// Close the open entry `entry_id` of `user_id` at `now`.
    ///
    /// Missing, foreign and already-closed entries are all `NotFound`. The
    /// close only applies while the row is still open, so of two concurrent
    /// clock-outs the second one is `NotFound` too.
    pub async fn clock_out(
        &self,
        user_id: i64,
        entry_id: i64,
        now: DateTime<Utc>,
    ) -> Result<TimeEntry, TimeEntryServiceError> {
        let entry = self.get(user_id, entry_id).await?;
        if !entry.is_open() {
            return Err(TimeEntryServiceError::NotFound);
        }

        let clock_out = ceil_to_second(now);
        check_clock_order(entry.clock_in, Some(clock_out))?;

        let closed = self
            .repo
            .close_open_for_user(user_id, entry_id, clock_out)
            .await?
            .ok_or(TimeEntryServiceError::NotFound)?;

        tracing::info!(user_id, entry_id, hours = closed.hours(now), "Clocked out");
        Ok(closed)
    }

    /// An entry owned by `user_id`
    pub async fn get(&self, user_id: i64, entry_id: i64) -> Result<TimeEntry, TimeEntryServiceError> {
        self.repo
            .get_for_user(user_id, entry_id)
            .await
            .context("Failed to get time entry")?
            .ok_or(TimeEntryServiceError::NotFound)
    }

    /// Create an entry from form input
    pub async fn create(&self, user_id: i64, input: TimeEntryInput) -> Result<TimeEntry, TimeEntryServiceError> {
        let mut entry = TimeEntry::open(user_id, input.clock_in, input.description);
        entry.clock_out = input.clock_out;
        entry.validate()?;

        match self.repo.create(&entry).await {
            Ok(created) => {
                tracing::debug!(user_id, entry_id = created.id, "Time entry created");
                Ok(created)
            }
            Err(e) if is_unique_violation(&e) => Err(TimeEntryServiceError::OpenEntryExists),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace times and description of an owned entry
    pub async fn update(
        &self,
        user_id: i64,
        entry_id: i64,
        input: TimeEntryInput,
    ) -> Result<TimeEntry, TimeEntryServiceError> {
        let mut entry = self.get(user_id, entry_id).await?;
        entry.clock_in = input.clock_in;
        entry.clock_out = input.clock_out;
        entry.description = input.description;
        entry.validate()?;

        match self.repo.update(&entry).await {
            Ok(Some(updated)) => {
                tracing::debug!(user_id, entry_id, "Time entry updated");
                Ok(updated)
            }
            Ok(None) => Err(TimeEntryServiceError::NotFound),
            Err(e) if is_unique_violation(&e) => Err(TimeEntryServiceError::OpenEntryExists),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete an owned entry
    pub async fn delete(&self, user_id: i64, entry_id: i64) -> Result<(), TimeEntryServiceError> {
        if !self.repo.delete_for_user(user_id, entry_id).await? {
            return Err(TimeEntryServiceError::NotFound);
        }
        tracing::debug!(user_id, entry_id, "Time entry deleted");
        Ok(())
    }

    /// Personal dashboard figures as of `now`
    pub async fn dashboard(&self, user_id: i64, now: DateTime<Utc>) -> Result<DashboardSummary, TimeEntryServiceError> {
        let week = week_window(self.tz, now);
        let month = month_window(self.tz, now);

        let active_entry = self.repo.get_open_for_user(user_id).await?;
        let week_hours = self.closed_hours(EntryFilter::for_user(user_id), week, now).await?;
        let month_hours = self.closed_hours(EntryFilter::for_user(user_id), month, now).await?;

        let recent_entries = self
            .repo
            .list(&EntryFilter::for_user(user_id).limit(DASHBOARD_RECENT_ENTRIES))
            .await?
            .into_iter()
            .map(|row| row.entry)
            .collect();

        Ok(DashboardSummary {
            active_entry,
            week,
            month,
            week_hours,
            month_hours,
            recent_entries,
        })
    }

    /// Newest entries, optionally for one account
    pub async fn list_recent(
        &self,
        user_id: Option<i64>,
        limit: i64,
    ) -> Result<Vec<TimeEntryWithUser>, TimeEntryServiceError> {
        let filter = match user_id {
            Some(id) => EntryFilter::for_user(id),
            None => EntryFilter::all(),
        };
        Ok(self.repo.list(&filter.limit(limit)).await?)
    }

    async fn closed_hours(
        &self,
        filter: EntryFilter,
        window: Window,
        now: DateTime<Utc>,
    ) -> Result<f64, TimeEntryServiceError> {
        let rows = self
            .repo
            .list(&filter.closed().clocked_in_between(window.start, window.end))
            .await?;
        Ok(rows.iter().map(|row| row.entry.hours(now)).sum())
    }
}
