//! Hour limit repository

use super::{backend, Backend};
use crate::db::DynDatabasePool;
use crate::models::{HourLimit, Period};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Hour limit repository trait
#[async_trait]
pub trait HourLimitRepository: Send + Sync {
    /// Limit for one period, if set
    async fn get(&self, period: Period) -> Result<Option<HourLimit>>;

    /// All limits ordered by period
    async fn list(&self) -> Result<Vec<HourLimit>>;

    /// Insert or replace the limit for `period`
    async fn upsert(&self, period: Period, max_hours: f64) -> Result<HourLimit>;

    /// Insert the limit only when `period` has none yet; returns whether a row was added
    async fn insert_if_missing(&self, period: Period, max_hours: f64) -> Result<bool>;
}

/// SQLx-based hour limit repository implementation
pub struct SqlxHourLimitRepository {
    pool: DynDatabasePool,
}

impl SqlxHourLimitRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn HourLimitRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl HourLimitRepository for SqlxHourLimitRepository {
    async fn get(&self, period: Period) -> Result<Option<HourLimit>> {
        let limits = self.list().await?;
        Ok(limits.into_iter().find(|l| l.period == period))
    }

    async fn list(&self) -> Result<Vec<HourLimit>> {
        match backend(&self.pool)? {
            Backend::Sqlite(pool) => list_limits_sqlite(pool).await,
            Backend::Mysql(pool) => list_limits_mysql(pool).await,
        }
    }

    async fn upsert(&self, period: Period, max_hours: f64) -> Result<HourLimit> {
        let now = Utc::now();
        match backend(&self.pool)? {
            Backend::Sqlite(pool) => {
                sqlx::query(
                    r#"
                    INSERT INTO hour_limits (period, max_hours, created_at, updated_at)
                    VALUES (?, ?, ?, ?)
                    ON CONFLICT(period) DO UPDATE
                    SET max_hours = excluded.max_hours, updated_at = excluded.updated_at
                    "#,
                )
                .bind(period.as_str())
                .bind(max_hours)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to save hour limit")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(
                    r#"
                    INSERT INTO hour_limits (period, max_hours, created_at, updated_at)
                    VALUES (?, ?, ?, ?)
                    ON DUPLICATE KEY UPDATE
                    max_hours = VALUES(max_hours), updated_at = VALUES(updated_at)
                    "#,
                )
                .bind(period.as_str())
                .bind(max_hours)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to save hour limit")?;
            }
        }

        self.get(period)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Hour limit not found after upsert"))
    }

    async fn insert_if_missing(&self, period: Period, max_hours: f64) -> Result<bool> {
        let now = Utc::now();
        let result = match backend(&self.pool)? {
            Backend::Sqlite(pool) => sqlx::query(
                "INSERT OR IGNORE INTO hour_limits (period, max_hours, created_at, updated_at) VALUES (?, ?, ?, ?)",
            )
            .bind(period.as_str())
            .bind(max_hours)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .map(|r| r.rows_affected()),
            Backend::Mysql(pool) => sqlx::query(
                "INSERT IGNORE INTO hour_limits (period, max_hours, created_at, updated_at) VALUES (?, ?, ?, ?)",
            )
            .bind(period.as_str())
            .bind(max_hours)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .map(|r| r.rows_affected()),
        };

        Ok(result.context("Failed to seed hour limit")? > 0)
    }
}

async fn list_limits_sqlite(pool: &SqlitePool) -> Result<Vec<HourLimit>> {
    let rows = sqlx::query(
        "SELECT id, period, max_hours, created_at, updated_at FROM hour_limits ORDER BY period DESC",
    )
    .fetch_all(pool)
    .await
    .context("Failed to list hour limits")?;

    let mut limits = Vec::with_capacity(rows.len());
    for row in rows {
        let period: String = row.get("period");
        limits.push(HourLimit {
            id: row.get("id"),
            period: Period::from_str(&period)
                .with_context(|| format!("Invalid period in database: {}", period))?,
            max_hours: row.get("max_hours"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        });
    }
    Ok(limits)
}

async fn list_limits_mysql(pool: &MySqlPool) -> Result<Vec<HourLimit>> {
    let rows = sqlx::query(
        "SELECT id, period, max_hours, created_at, updated_at FROM hour_limits ORDER BY period DESC",
    )
    .fetch_all(pool)
    .await
    .context("Failed to list hour limits")?;

    let mut limits = Vec::with_capacity(rows.len());
    for row in rows {
        let period: String = row.get("period");
        limits.push(HourLimit {
            id: row.get("id"),
            period: Period::from_str(&period)
                .with_context(|| format!("Invalid period in database: {}", period))?,
            max_hours: row.get("max_hours"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        });
    }
    Ok(limits)
}
