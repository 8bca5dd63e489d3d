//! Staff reports
//!
//! Aggregates closed time entries over calendar windows: the staff dashboard
//! (hours against limits, per-worker pay estimates) and the date-ranged pay
//! report. Pay is always derived as hours times the current hourly rate and
//! never stored.

use crate::db::repositories::time_entry::EntryFilter;
use crate::db::repositories::{
    AccountRepository, HourLimitRepository, PayRateRepository, TimeEntryRepository,
};
use crate::models::{hours_between, usage_percent, Period, TimeEntry, TimeEntryWithUser};
use crate::services::period::{date_range_window, month_bounds, window_for, Window};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Closed entries listed on the staff dashboard
pub const ADMIN_RECENT_ENTRIES: i64 = 20;

#[derive(Debug, thiserror::Error)]
pub enum ReportServiceError {
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Closed hours of one period measured against its limit
#[derive(Debug, Clone, Serialize)]
pub struct PeriodUsage {
    pub period: Period,
    pub window: Window,
    pub hours: f64,
    pub max_hours: Option<f64>,
    pub usage_percent: f64,
}

/// Per-worker line of the staff dashboard
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStats {
    pub user_id: i64,
    pub username: String,
    pub week_hours: f64,
    pub month_hours: f64,
    /// 0 when the worker has no pay rate
    pub hourly_rate: f64,
    pub week_pay: f64,
    pub month_pay: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminSummary {
    pub week: PeriodUsage,
    pub month: PeriodUsage,
    pub users_stats: Vec<WorkerStats>,
    pub total_week_pay: f64,
    pub total_month_pay: f64,
    pub recent_entries: Vec<EntryHours>,
    pub active_entries: Vec<EntryHours>,
}

/// Listed entry with its hours; open entries are measured up to the report time
#[derive(Debug, Clone, Serialize)]
pub struct EntryHours {
    #[serde(flatten)]
    pub row: TimeEntryWithUser,
    pub hours: f64,
}

impl EntryHours {
    fn new(row: TimeEntryWithUser, now: DateTime<Utc>) -> Self {
        let hours = row.entry.hours(now);
        Self { row, hours }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PayReportEntry {
    #[serde(flatten)]
    pub entry: TimeEntry,
    pub hours: f64,
    pub pay: f64,
}

/// All entries of one account within the report range
#[derive(Debug, Clone, Serialize)]
pub struct PayReportUser {
    pub user_id: i64,
    pub username: String,
    pub hourly_rate: f64,
    pub entries: Vec<PayReportEntry>,
    pub total_hours: f64,
    pub total_pay: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PayReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub users: Vec<PayReportUser>,
    pub total_hours: f64,
    pub total_pay: f64,
}

/// Report service
pub struct ReportService {
    entries: Arc<dyn TimeEntryRepository>,
    accounts: Arc<dyn AccountRepository>,
    rates: Arc<dyn PayRateRepository>,
    limits: Arc<dyn HourLimitRepository>,
    tz: Tz,
}

impl ReportService {
    pub fn new(
        entries: Arc<dyn TimeEntryRepository>,
        accounts: Arc<dyn AccountRepository>,
        rates: Arc<dyn PayRateRepository>,
        limits: Arc<dyn HourLimitRepository>,
        tz: Tz,
    ) -> Self {
        Self {
            entries,
            accounts,
            rates,
            limits,
            tz,
        }
    }

    /// First and last day of the current month, the pay report's default range
    pub fn default_range(&self, now: DateTime<Utc>) -> (NaiveDate, NaiveDate) {
        month_bounds(self.tz, now)
    }

    /// Closed hours of every period against its limit
    pub async fn limit_usage(&self, now: DateTime<Utc>) -> Result<Vec<PeriodUsage>, ReportServiceError> {
        let mut usage = Vec::with_capacity(Period::ALL.len());
        for period in Period::ALL {
            let window = window_for(period, self.tz, now);
            let rows = self.closed_in(window).await?;
            usage.push(self.period_usage(period, window, total_hours(&rows)).await?);
        }
        Ok(usage)
    }

    pub async fn admin_summary(&self, now: DateTime<Utc>) -> Result<AdminSummary, ReportServiceError> {
        let week_window = window_for(Period::Weekly, self.tz, now);
        let month_window = window_for(Period::Monthly, self.tz, now);

        let week_rows = self.closed_in(week_window).await?;
        let month_rows = self.closed_in(month_window).await?;

        let week = self
            .period_usage(Period::Weekly, week_window, total_hours(&week_rows))
            .await?;
        let month = self
            .period_usage(Period::Monthly, month_window, total_hours(&month_rows))
            .await?;

        let week_by_user = hours_by_user(&week_rows);
        let month_by_user = hours_by_user(&month_rows);
        let rates = self.rate_map().await?;

        let users_stats: Vec<WorkerStats> = self
            .accounts
            .list_active_workers()
            .await?
            .into_iter()
            .map(|account| {
                let week_hours = week_by_user.get(&account.id).copied().unwrap_or(0.0);
                let month_hours = month_by_user.get(&account.id).copied().unwrap_or(0.0);
                let hourly_rate = rates.get(&account.id).copied().unwrap_or(0.0);
                WorkerStats {
                    user_id: account.id,
                    username: account.username,
                    week_hours,
                    month_hours,
                    hourly_rate,
                    week_pay: week_hours * hourly_rate,
                    month_pay: month_hours * hourly_rate,
                }
            })
            .collect();

        let total_week_pay = users_stats.iter().map(|s| s.week_pay).sum();
        let total_month_pay = users_stats.iter().map(|s| s.month_pay).sum();

        let recent_entries = self
            .entries
            .list(&EntryFilter::all().closed().limit(ADMIN_RECENT_ENTRIES))
            .await?
            .into_iter()
            .map(|row| EntryHours::new(row, now))
            .collect();
        let active_entries = self
            .entries
            .list(&EntryFilter::all().open())
            .await?
            .into_iter()
            .map(|row| EntryHours::new(row, now))
            .collect();

        Ok(AdminSummary {
            week,
            month,
            users_stats,
            total_week_pay,
            total_month_pay,
            recent_entries,
            active_entries,
        })
    }

    /// Pay report over local days `start..=end`.
    ///
    /// Accounts appear in order of their most recent entry in the range. A
    /// reversed range yields an empty report.
    pub async fn pay_report(&self, start: NaiveDate, end: NaiveDate) -> Result<PayReport, ReportServiceError> {
        let mut report = PayReport {
            start_date: start,
            end_date: end,
            users: Vec::new(),
            total_hours: 0.0,
            total_pay: 0.0,
        };
        if start > end {
            return Ok(report);
        }

        let rows = self.closed_in(date_range_window(self.tz, start, end)).await?;
        let rates = self.rate_map().await?;

        let mut positions: HashMap<i64, usize> = HashMap::new();
        for row in rows {
            let user_id = row.entry.user_id;
            let index = *positions.entry(user_id).or_insert_with(|| {
                report.users.push(PayReportUser {
                    user_id,
                    username: row.username.clone(),
                    hourly_rate: rates.get(&user_id).copied().unwrap_or(0.0),
                    entries: Vec::new(),
                    total_hours: 0.0,
                    total_pay: 0.0,
                });
                report.users.len() - 1
            });

            let group = &mut report.users[index];
            let hours = closed_hours(&row.entry).unwrap_or(0.0);
            let pay = hours * group.hourly_rate;
            group.total_hours += hours;
            group.total_pay += pay;
            group.entries.push(PayReportEntry {
                entry: row.entry,
                hours,
                pay,
            });
        }

        report.total_hours = report.users.iter().map(|u| u.total_hours).sum();
        report.total_pay = report.users.iter().map(|u| u.total_pay).sum();
        Ok(report)
    }

    async fn closed_in(&self, window: Window) -> Result<Vec<TimeEntryWithUser>, ReportServiceError> {
        Ok(self
            .entries
            .list(&EntryFilter::all().closed().clocked_in_between(window.start, window.end))
            .await?)
    }

    async fn period_usage(
        &self,
        period: Period,
        window: Window,
        hours: f64,
    ) -> Result<PeriodUsage, ReportServiceError> {
        let max_hours = self.limits.get(period).await?.map(|limit| limit.max_hours);
        Ok(PeriodUsage {
            period,
            window,
            hours,
            max_hours,
            usage_percent: usage_percent(hours, max_hours),
        })
    }

    async fn rate_map(&self) -> Result<HashMap<i64, f64>, ReportServiceError> {
        Ok(self
            .rates
            .list()
            .await?
            .into_iter()
            .map(|r| (r.rate.user_id, r.rate.hourly_rate))
            .collect())
    }
}

fn total_hours(rows: &[TimeEntryWithUser]) -> f64 {
    rows.iter().filter_map(|row| closed_hours(&row.entry)).sum()
}

fn hours_by_user(rows: &[TimeEntryWithUser]) -> HashMap<i64, f64> {
    let mut totals = HashMap::new();
    for row in rows {
        if let Some(hours) = closed_hours(&row.entry) {
            *totals.entry(row.entry.user_id).or_insert(0.0) += hours;
        }
    }
    totals
}

fn closed_hours(entry: &TimeEntry) -> Option<f64> {
    entry
        .clock_out
        .map(|out| hours_between(entry.clock_in, out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxAccountRepository, SqlxHourLimitRepository, SqlxPayRateRepository, SqlxTimeEntryRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::Account;
    use chrono::{Duration, TimeZone};

    struct Fixture {
        service: ReportService,
        entries: Arc<dyn TimeEntryRepository>,
        rates: Arc<dyn PayRateRepository>,
        limits: Arc<dyn HourLimitRepository>,
        alice: i64,
        bob: i64,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let accounts = SqlxAccountRepository::boxed(pool.clone());
        let mut ids = Vec::new();
        for name in ["alice", "bob", "boss"] {
            let mut account = Account::new(name.to_string(), format!("{}@example.com", name), "hash".to_string());
            account.is_staff = name == "boss";
            ids.push(accounts.create(&account).await.expect("Failed to create account").id);
        }

        let entries = SqlxTimeEntryRepository::boxed(pool.clone());
        let rates = SqlxPayRateRepository::boxed(pool.clone());
        let limits = SqlxHourLimitRepository::boxed(pool);
        limits.insert_if_missing(Period::Weekly, 40.0).await.unwrap();
        limits.insert_if_missing(Period::Monthly, 160.0).await.unwrap();

        let service = ReportService::new(
            entries.clone(),
            accounts,
            rates.clone(),
            limits.clone(),
            chrono_tz::UTC,
        );
        Fixture {
            service,
            entries,
            rates,
            limits,
            alice: ids[0],
            bob: ids[1],
        }
    }

    fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, h, m, 0).unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    async fn add_closed(fx: &Fixture, user_id: i64, start: DateTime<Utc>, end: DateTime<Utc>) {
        let mut entry = TimeEntry::open(user_id, start, String::new());
        entry.clock_out = Some(end);
        fx.entries.create(&entry).await.expect("Failed to create entry");
    }

    #[tokio::test]
    async fn test_pay_report_single_day() {
        let fx = setup().await;
        fx.rates.upsert(fx.alice, 20.0).await.unwrap();
        add_closed(&fx, fx.alice, at(4, 9, 0), at(4, 17, 30)).await;

        let report = fx.service.pay_report(date(4), date(4)).await.unwrap();
        assert_eq!(report.users.len(), 1);
        assert_eq!(report.users[0].entries[0].hours, 8.5);
        assert_eq!(format!("{:.2}", report.total_pay), "170.00");
        assert_eq!(report.total_hours, 8.5);
    }

    #[tokio::test]
    async fn test_pay_report_groups_by_latest_entry() {
        let fx = setup().await;
        fx.rates.upsert(fx.alice, 10.0).await.unwrap();
        add_closed(&fx, fx.alice, at(4, 9, 0), at(4, 10, 0)).await;
        add_closed(&fx, fx.bob, at(5, 9, 0), at(5, 12, 0)).await;
        add_closed(&fx, fx.alice, at(6, 9, 0), at(6, 11, 0)).await;
        // outside the range
        add_closed(&fx, fx.bob, at(8, 9, 0), at(8, 10, 0)).await;
        // still open
        fx.entries
            .create(&TimeEntry::open(fx.bob, at(7, 9, 0), String::new()))
            .await
            .unwrap();

        let report = fx.service.pay_report(date(4), date(7)).await.unwrap();
        let names: Vec<_> = report.users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);

        let alice = &report.users[0];
        assert_eq!(alice.entries.len(), 2);
        assert_eq!(alice.entries[0].entry.clock_in, at(6, 9, 0));
        assert_eq!(alice.total_hours, 3.0);
        assert_eq!(alice.total_pay, 30.0);

        let bob = &report.users[1];
        assert_eq!(bob.hourly_rate, 0.0);
        assert_eq!(bob.total_pay, 0.0);

        assert_eq!(report.total_hours, 6.0);
        assert_eq!(report.total_pay, 30.0);
    }

    #[tokio::test]
    async fn test_pay_report_reversed_range_is_empty() {
        let fx = setup().await;
        add_closed(&fx, fx.alice, at(4, 9, 0), at(4, 10, 0)).await;

        let report = fx.service.pay_report(date(5), date(4)).await.unwrap();
        assert!(report.users.is_empty());
        assert_eq!(report.total_hours, 0.0);
    }

    #[tokio::test]
    async fn test_default_range_covers_month() {
        let fx = setup().await;
        let (start, end) = fx.service.default_range(at(20, 12, 0));
        assert_eq!(start, date(1));
        assert_eq!(end, date(31));
    }

    #[tokio::test]
    async fn test_admin_summary_usage_over_limit() {
        let fx = setup().await;
        fx.rates.upsert(fx.alice, 20.0).await.unwrap();
        for d in 4..=7 {
            add_closed(&fx, fx.alice, at(d, 8, 0), at(d, 18, 0)).await;
        }
        add_closed(&fx, fx.alice, at(8, 8, 0), at(8, 10, 0)).await;
        // previous week, same month
        add_closed(&fx, fx.bob, at(1, 9, 0), at(1, 13, 0)).await;
        fx.entries
            .create(&TimeEntry::open(fx.bob, at(8, 11, 0), String::new()))
            .await
            .unwrap();

        let summary = fx.service.admin_summary(at(8, 12, 0)).await.unwrap();
        assert_eq!(summary.week.hours, 42.0);
        assert_eq!(format!("{:.1}", summary.week.usage_percent), "105.0");
        assert_eq!(summary.month.hours, 46.0);

        let names: Vec<_> = summary.users_stats.iter().map(|s| s.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
        assert_eq!(summary.users_stats[0].week_pay, 840.0);
        assert_eq!(summary.users_stats[1].week_hours, 0.0);
        assert_eq!(summary.users_stats[1].month_hours, 4.0);
        assert_eq!(summary.total_week_pay, 840.0);
        assert_eq!(summary.total_month_pay, 840.0);

        assert_eq!(summary.recent_entries.len(), 6);
        assert!(summary.recent_entries.iter().all(|r| r.row.entry.clock_out.is_some()));
        assert_eq!(summary.recent_entries[0].hours, 2.0);
        assert_eq!(summary.active_entries.len(), 1);
        assert_eq!(summary.active_entries[0].row.username, "bob");
        assert_eq!(summary.active_entries[0].hours, 1.0);
    }

    #[tokio::test]
    async fn test_limit_usage_without_limit_is_zero() {
        let fx = setup().await;
        fx.limits.upsert(Period::Monthly, 0.0).await.unwrap();
        add_closed(&fx, fx.alice, at(4, 9, 0), at(4, 9, 0) + Duration::hours(3)).await;

        let usage = fx.service.limit_usage(at(4, 18, 0)).await.unwrap();
        assert_eq!(usage[0].period, Period::Weekly);
        assert_eq!(usage[0].hours, 3.0);
        assert_eq!(usage[1].max_hours, Some(0.0));
        assert_eq!(usage[1].usage_percent, 0.0);
    }
}
