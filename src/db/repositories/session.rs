//! Session repository
//!
//! Server-side login sessions keyed by the token stored in the `session`
//! cookie. Expired rows are purged at startup.

use super::{backend, Backend};
use crate::db::DynDatabasePool;
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Store a new session
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Get session by token
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    /// Delete a session
    async fn delete(&self, id: &str) -> Result<()>;

    /// Delete all sessions of an account
    async fn delete_by_user(&self, user_id: i64) -> Result<u64>;

    /// Delete sessions that expired before `now`
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// SQLx-based session repository implementation
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        let sql = "INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)";
        let result = match backend(&self.pool)? {
            Backend::Sqlite(pool) => {
                sqlx::query(sql)
                    .bind(&session.id)
                    .bind(session.user_id)
                    .bind(session.expires_at)
                    .bind(session.created_at)
                    .execute(pool)
                    .await
                    .map(|_| ())
            }
            Backend::Mysql(pool) => {
                sqlx::query(sql)
                    .bind(&session.id)
                    .bind(session.user_id)
                    .bind(session.expires_at)
                    .bind(session.created_at)
                    .execute(pool)
                    .await
                    .map(|_| ())
            }
        };
        result.context("Failed to create session")?;

        Ok(session.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        match backend(&self.pool)? {
            Backend::Sqlite(pool) => get_session_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_session_mysql(pool, id).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let sql = "DELETE FROM sessions WHERE id = ?";
        let result = match backend(&self.pool)? {
            Backend::Sqlite(pool) => sqlx::query(sql).bind(id).execute(pool).await.map(|_| ()),
            Backend::Mysql(pool) => sqlx::query(sql).bind(id).execute(pool).await.map(|_| ()),
        };
        result.context("Failed to delete session")
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<u64> {
        let sql = "DELETE FROM sessions WHERE user_id = ?";
        let result = match backend(&self.pool)? {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(user_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(user_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
        };
        result.context("Failed to delete sessions for account")
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let sql = "DELETE FROM sessions WHERE expires_at < ?";
        let result = match backend(&self.pool)? {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(now)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(now)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
        };
        result.context("Failed to delete expired sessions")
    }
}

async fn get_session_sqlite(pool: &SqlitePool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query("SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get session")?;

    Ok(row.map(|row| Session {
        id: row.get("id"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }))
}

async fn get_session_mysql(pool: &MySqlPool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query("SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get session")?;

    Ok(row.map(|row| Session {
        id: row.get("id"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{AccountRepository, SqlxAccountRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::Account;
    use chrono::Duration;

    async fn setup_test_repo() -> (SqlxSessionRepository, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let accounts = SqlxAccountRepository::new(pool.clone());
        let mut ids = Vec::new();
        for name in ["alice", "bob"] {
            let account = Account::new(name.to_string(), format!("{}@example.com", name), "hash".to_string());
            ids.push(accounts.create(&account).await.expect("Failed to create account").id);
        }

        (SqlxSessionRepository::new(pool), ids[0], ids[1])
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let (repo, alice, _) = setup_test_repo().await;
        let session = Session::new(alice, Duration::days(7));
        repo.create(&session).await.unwrap();

        let found = repo.get_by_id(&session.id).await.unwrap().expect("session exists");
        assert_eq!(found.user_id, alice);
        assert!(!found.is_expired());
        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_requires_existing_account() {
        let (repo, _, _) = setup_test_repo().await;
        assert!(repo.create(&Session::new(999, Duration::days(1))).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_by_user_leaves_other_accounts() {
        let (repo, alice, bob) = setup_test_repo().await;
        let a1 = Session::new(alice, Duration::days(7));
        let a2 = Session::new(alice, Duration::days(7));
        let b1 = Session::new(bob, Duration::days(7));
        for s in [&a1, &a2, &b1] {
            repo.create(s).await.unwrap();
        }

        assert_eq!(repo.delete_by_user(alice).await.unwrap(), 2);
        assert!(repo.get_by_id(&a1.id).await.unwrap().is_none());
        assert!(repo.get_by_id(&b1.id).await.unwrap().is_some());

        repo.delete(&b1.id).await.unwrap();
        assert!(repo.get_by_id(&b1.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_expired_sessions() {
        let (repo, alice, _) = setup_test_repo().await;

        let mut expired = Session::new(alice, Duration::days(7));
        expired.expires_at = Utc::now() - Duration::days(1);
        let valid = Session::new(alice, Duration::days(7));
        repo.create(&expired).await.unwrap();
        repo.create(&valid).await.unwrap();

        assert_eq!(repo.delete_expired(Utc::now()).await.unwrap(), 1);
        assert!(repo.get_by_id(&expired.id).await.unwrap().is_none());
        assert!(repo.get_by_id(&valid.id).await.unwrap().is_some());
    }
}
