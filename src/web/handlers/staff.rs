//! Staff dashboard and pay report

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tera::Context as TeraContext;

use super::render;
use crate::services::ReportService;
use crate::web::error::WebError;
use crate::web::middleware::{AppState, PageVars, StaffAccount};

/// GET /admin-dashboard/
pub async fn admin_dashboard(
    State(state): State<AppState>,
    StaffAccount(_staff): StaffAccount,
    vars: PageVars,
) -> Result<Response, WebError> {
    let summary = state.reports.admin_summary(Utc::now()).await?;

    let mut context = TeraContext::new();
    context.insert("periods", &[&summary.week, &summary.month]);
    context.insert("summary", &summary);
    Ok(render(&state, "admin_dashboard.html", &context, &vars.0)?.into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct PayReportQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl PayReportQuery {
    /// Both dates, when both are present and valid
    fn range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let start = self.start_date.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let end = self.end_date.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        match (
            NaiveDate::parse_from_str(start, "%Y-%m-%d"),
            NaiveDate::parse_from_str(end, "%Y-%m-%d"),
        ) {
            (Ok(start), Ok(end)) => Some((start, end)),
            _ => {
                tracing::warn!(start, end, "Invalid pay report dates, using current month");
                None
            }
        }
    }

    /// The requested range, or the month containing `now`
    fn resolve(&self, reports: &ReportService, now: DateTime<Utc>) -> (NaiveDate, NaiveDate) {
        self.range().unwrap_or_else(|| reports.default_range(now))
    }
}

/// GET /pay-report/?start_date=YYYY-MM-DD&end_date=YYYY-MM-DD
///
/// Without both dates the report covers the current month.
pub async fn pay_report(
    State(state): State<AppState>,
    StaffAccount(_staff): StaffAccount,
    vars: PageVars,
    Query(query): Query<PayReportQuery>,
) -> Result<Response, WebError> {
    let (start, end) = query.resolve(&state.reports, Utc::now());
    let report = state.reports.pay_report(start, end).await?;

    let mut context = TeraContext::new();
    context.insert("report", &report);
    context.insert("start_date", &start.format("%Y-%m-%d").to_string());
    context.insert("end_date", &end.format("%Y-%m-%d").to_string());
    Ok(render(&state, "pay_report.html", &context, &vars.0)?.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxAccountRepository, SqlxHourLimitRepository, SqlxPayRateRepository, SqlxTimeEntryRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use chrono::TimeZone;

    async fn reports(tz: chrono_tz::Tz) -> ReportService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        ReportService::new(
            SqlxTimeEntryRepository::boxed(pool.clone()),
            SqlxAccountRepository::boxed(pool.clone()),
            SqlxPayRateRepository::boxed(pool.clone()),
            SqlxHourLimitRepository::boxed(pool),
            tz,
        )
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn query(start: Option<&str>, end: Option<&str>) -> PayReportQuery {
        PayReportQuery {
            start_date: start.map(String::from),
            end_date: end.map(String::from),
        }
    }

    #[test]
    fn test_range_needs_both_dates() {
        assert_eq!(
            query(Some("2024-03-01"), Some("2024-03-15")).range(),
            Some((
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
            ))
        );
        assert_eq!(query(Some("2024-03-01"), None).range(), None);
        assert_eq!(query(Some("2024-03-01"), Some("")).range(), None);
        assert_eq!(query(Some("03/01/2024"), Some("2024-03-15")).range(), None);
    }

    #[tokio::test]
    async fn test_missing_dates_resolve_to_whole_month() {
        let reports = reports(chrono_tz::UTC).await;
        let empty = query(None, None);

        let december = Utc.with_ymd_and_hms(2024, 12, 15, 12, 0, 0).unwrap();
        assert_eq!(empty.resolve(&reports, december), (ymd(2024, 12, 1), ymd(2024, 12, 31)));

        let leap = Utc.with_ymd_and_hms(2024, 2, 10, 12, 0, 0).unwrap();
        assert_eq!(empty.resolve(&reports, leap), (ymd(2024, 2, 1), ymd(2024, 2, 29)));

        // invalid input falls back the same way
        let bad = query(Some("2024-13-01"), Some("2024-03-15"));
        assert_eq!(bad.resolve(&reports, december), (ymd(2024, 12, 1), ymd(2024, 12, 31)));

        let explicit = query(Some("2024-03-01"), Some("2024-03-15"));
        assert_eq!(explicit.resolve(&reports, december), (ymd(2024, 3, 1), ymd(2024, 3, 15)));
    }

    #[tokio::test]
    async fn test_month_follows_configured_zone() {
        // 2025-01-01 03:00 UTC is still New Year's Eve in New York
        let reports = reports(chrono_tz::America::New_York).await;
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 3, 0, 0).unwrap();
        assert_eq!(query(None, None).resolve(&reports, now), (ymd(2024, 12, 1), ymd(2024, 12, 31)));
    }
}
