//! Pay rate repository

use super::{backend, Backend};
use crate::db::DynDatabasePool;
use crate::models::{PayRate, PayRateWithUser};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Pay rate repository trait
#[async_trait]
pub trait PayRateRepository: Send + Sync {
    /// Rate of one account, if set
    async fn get_for_user(&self, user_id: i64) -> Result<Option<PayRate>>;

    /// All rates with usernames, ordered by username
    async fn list(&self) -> Result<Vec<PayRateWithUser>>;

    /// Insert or replace the rate of `user_id`
    async fn upsert(&self, user_id: i64, hourly_rate: f64) -> Result<PayRate>;
}

/// SQLx-based pay rate repository implementation
pub struct SqlxPayRateRepository {
    pool: DynDatabasePool,
}

impl SqlxPayRateRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PayRateRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PayRateRepository for SqlxPayRateRepository {
    async fn get_for_user(&self, user_id: i64) -> Result<Option<PayRate>> {
        match backend(&self.pool)? {
            Backend::Sqlite(pool) => get_rate_sqlite(pool, user_id).await,
            Backend::Mysql(pool) => get_rate_mysql(pool, user_id).await,
        }
    }

    async fn list(&self) -> Result<Vec<PayRateWithUser>> {
        match backend(&self.pool)? {
            Backend::Sqlite(pool) => list_rates_sqlite(pool).await,
            Backend::Mysql(pool) => list_rates_mysql(pool).await,
        }
    }

    async fn upsert(&self, user_id: i64, hourly_rate: f64) -> Result<PayRate> {
        let now = Utc::now();
        match backend(&self.pool)? {
            Backend::Sqlite(pool) => {
                sqlx::query(
                    r#"
                    INSERT INTO pay_rates (user_id, hourly_rate, created_at, updated_at)
                    VALUES (?, ?, ?, ?)
                    ON CONFLICT(user_id) DO UPDATE
                    SET hourly_rate = excluded.hourly_rate, updated_at = excluded.updated_at
                    "#,
                )
                .bind(user_id)
                .bind(hourly_rate)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to save pay rate")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(
                    r#"
                    INSERT INTO pay_rates (user_id, hourly_rate, created_at, updated_at)
                    VALUES (?, ?, ?, ?)
                    ON DUPLICATE KEY UPDATE
                    hourly_rate = VALUES(hourly_rate), updated_at = VALUES(updated_at)
                    "#,
                )
                .bind(user_id)
                .bind(hourly_rate)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to save pay rate")?;
            }
        }

        self.get_for_user(user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Pay rate not found after upsert"))
    }
}

const RATE_COLUMNS: &str = "r.id, r.user_id, r.hourly_rate, r.created_at, r.updated_at";

async fn get_rate_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Option<PayRate>> {
    let sql = format!("SELECT {} FROM pay_rates r WHERE r.user_id = ?", RATE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get pay rate")?;

    Ok(row.map(|row| PayRate {
        id: row.get("id"),
        user_id: row.get("user_id"),
        hourly_rate: row.get("hourly_rate"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }))
}

async fn list_rates_sqlite(pool: &SqlitePool) -> Result<Vec<PayRateWithUser>> {
    let sql = format!(
        "SELECT {}, u.username FROM pay_rates r JOIN users u ON u.id = r.user_id ORDER BY u.username",
        RATE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list pay rates")?;

    Ok(rows
        .iter()
        .map(|row| PayRateWithUser {
            rate: PayRate {
                id: row.get("id"),
                user_id: row.get("user_id"),
                hourly_rate: row.get("hourly_rate"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            },
            username: row.get("username"),
        })
        .collect())
}

async fn get_rate_mysql(pool: &MySqlPool, user_id: i64) -> Result<Option<PayRate>> {
    let sql = format!("SELECT {} FROM pay_rates r WHERE r.user_id = ?", RATE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get pay rate")?;

    Ok(row.map(|row| PayRate {
        id: row.get("id"),
        user_id: row.get("user_id"),
        hourly_rate: row.get("hourly_rate"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }))
}

async fn list_rates_mysql(pool: &MySqlPool) -> Result<Vec<PayRateWithUser>> {
    let sql = format!(
        "SELECT {}, u.username FROM pay_rates r JOIN users u ON u.id = r.user_id ORDER BY u.username",
        RATE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list pay rates")?;

    Ok(rows
        .iter()
        .map(|row| PayRateWithUser {
            rate: PayRate {
                id: row.get("id"),
                user_id: row.get("user_id"),
                hourly_rate: row.get("hourly_rate"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            },
            username: row.get("username"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{AccountRepository, SqlxAccountRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::Account;

    async fn setup_test_repo() -> (SqlxPayRateRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let account = SqlxAccountRepository::new(pool.clone())
            .create(&Account::new("dana".to_string(), "dana@example.com".to_string(), "hash".to_string()))
            .await
            .expect("Failed to create account");

        (SqlxPayRateRepository::new(pool), account.id)
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_replaces() {
        let (repo, dana) = setup_test_repo().await;
        assert!(repo.get_for_user(dana).await.unwrap().is_none());

        let first = repo.upsert(dana, 20.0).await.unwrap();
        assert_eq!(first.hourly_rate, 20.0);

        let second = repo.upsert(dana, 22.5).await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.hourly_rate, 22.5);

        let listed = repo.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].username, "dana");
    }

    #[tokio::test]
    async fn test_negative_rate_rejected_by_schema() {
        let (repo, dana) = setup_test_repo().await;
        assert!(repo.upsert(dana, -1.0).await.is_err());
    }
}
