//! Pay rate and hour limit services
//!
//! Plain data access for the two administrative record types, used by the
//! admin tool and the reports. Values are rounded to two decimal places on
//! write.

use crate::db::repositories::{AccountRepository, HourLimitRepository, PayRateRepository};
use crate::models::{round2, HourLimit, PayRate, PayRateWithUser, Period};
use anyhow::Context;
use std::sync::Arc;

/// Largest storable hourly rate
pub const MAX_HOURLY_RATE: f64 = 99_999_999.99;

/// Largest storable hour limit
pub const MAX_LIMIT_HOURS: f64 = 999.99;

/// Error types for pay rate and hour limit operations
#[derive(Debug, thiserror::Error)]
pub enum RecordServiceError {
    #[error("No account named '{0}'")]
    UnknownAccount(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

fn check_amount(value: f64, max: f64, what: &str) -> Result<f64, RecordServiceError> {
    if !value.is_finite() || value < 0.0 {
        return Err(RecordServiceError::InvalidValue(format!(
            "{} must be a non-negative number",
            what
        )));
    }
    let rounded = round2(value);
    if rounded > max {
        return Err(RecordServiceError::InvalidValue(format!(
            "{} must not exceed {:.2}",
            what, max
        )));
    }
    Ok(rounded)
}

/// Pay rate service
pub struct PayRateService {
    rates: Arc<dyn PayRateRepository>,
    accounts: Arc<dyn AccountRepository>,
}

impl PayRateService {
    pub fn new(rates: Arc<dyn PayRateRepository>, accounts: Arc<dyn AccountRepository>) -> Self {
        Self { rates, accounts }
    }

    /// All rates, ordered by username
    pub async fn list(&self) -> Result<Vec<PayRateWithUser>, RecordServiceError> {
        Ok(self.rates.list().await?)
    }

    /// Set the rate of the account named `username`
    pub async fn set_rate(&self, username: &str, hourly_rate: f64) -> Result<PayRate, RecordServiceError> {
        let hourly_rate = check_amount(hourly_rate, MAX_HOURLY_RATE, "Hourly rate")?;
        let account = self
            .accounts
            .get_by_username(username)
            .await
            .context("Failed to look up account")?
            .ok_or_else(|| RecordServiceError::UnknownAccount(username.to_string()))?;

        let rate = self.rates.upsert(account.id, hourly_rate).await?;
        tracing::info!(username = %account.username, hourly_rate, "Pay rate set");
        Ok(rate)
    }
}

/// Hour limit service
pub struct HourLimitService {
    limits: Arc<dyn HourLimitRepository>,
}

impl HourLimitService {
    pub fn new(limits: Arc<dyn HourLimitRepository>) -> Self {
        Self { limits }
    }

    /// Insert or replace the limit of `period`
    pub async fn set_limit(&self, period: Period, max_hours: f64) -> Result<HourLimit, RecordServiceError> {
        let max_hours = check_amount(max_hours, MAX_LIMIT_HOURS, "Maximum hours")?;
        let limit = self.limits.upsert(period, max_hours).await?;
        tracing::info!(%period, max_hours, "Hour limit set");
        Ok(limit)
    }

    /// Make sure every period has a limit, leaving existing ones untouched.
    ///
    /// Returns how many limits were created.
    pub async fn ensure_defaults(&self, weekly: f64, monthly: f64) -> Result<usize, RecordServiceError> {
        let mut created = 0;
        for (period, hours) in [(Period::Weekly, weekly), (Period::Monthly, monthly)] {
            let hours = check_amount(hours, MAX_LIMIT_HOURS, "Default hours")?;
            if self.limits.insert_if_missing(period, hours).await? {
                tracing::info!(%period, max_hours = hours, "Seeded default hour limit");
                created += 1;
            }
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxAccountRepository, SqlxHourLimitRepository, SqlxPayRateRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::Account;

    async fn setup_services() -> (PayRateService, HourLimitService, Arc<dyn HourLimitRepository>) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let accounts = SqlxAccountRepository::boxed(pool.clone());
        accounts
            .create(&Account::new("erin".to_string(), "erin@example.com".to_string(), "hash".to_string()))
            .await
            .expect("Failed to create account");

        let limit_repo = SqlxHourLimitRepository::boxed(pool.clone());
        (
            PayRateService::new(SqlxPayRateRepository::boxed(pool), accounts),
            HourLimitService::new(limit_repo.clone()),
            limit_repo,
        )
    }

    #[tokio::test]
    async fn test_set_rate_rounds_and_replaces() {
        let (rates, _, _) = setup_services().await;

        let rate = rates.set_rate("erin", 20.005).await.unwrap();
        assert_eq!(rate.hourly_rate, 20.01);

        rates.set_rate("erin", 25.0).await.unwrap();
        let listed = rates.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].rate.user_id, rate.user_id);
        assert_eq!(listed[0].rate.hourly_rate, 25.0);
    }

    #[tokio::test]
    async fn test_set_rate_rejects_bad_input() {
        let (rates, _, _) = setup_services().await;

        assert!(matches!(
            rates.set_rate("nobody", 10.0).await,
            Err(RecordServiceError::UnknownAccount(_))
        ));
        assert!(matches!(
            rates.set_rate("erin", -1.0).await,
            Err(RecordServiceError::InvalidValue(_))
        ));
        assert!(matches!(
            rates.set_rate("erin", f64::NAN).await,
            Err(RecordServiceError::InvalidValue(_))
        ));
    }

    #[tokio::test]
    async fn test_ensure_defaults_is_idempotent() {
        let (_, limits, repo) = setup_services().await;

        assert_eq!(limits.ensure_defaults(40.0, 160.0).await.unwrap(), 2);
        limits.set_limit(Period::Weekly, 37.5).await.unwrap();
        assert_eq!(limits.ensure_defaults(40.0, 160.0).await.unwrap(), 0);

        let weekly = repo.get(Period::Weekly).await.unwrap().unwrap();
        assert_eq!(weekly.max_hours, 37.5);
        assert_eq!(repo.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_limit_upper_bound() {
        let (_, limits, _) = setup_services().await;
        assert!(limits.set_limit(Period::Monthly, 1000.0).await.is_err());
        assert!(limits.set_limit(Period::Monthly, 999.99).await.is_ok());
    }
}
