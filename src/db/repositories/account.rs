//! Account repository
//!
//! - `AccountRepository` trait defining the interface for account data access
//! - `SqlxAccountRepository` implementing the trait for SQLite and MySQL
//!
//! Username and email lookups are case-insensitive on both backends
//! (`COLLATE NOCASE` on SQLite, the default collation on MySQL).

use super::{backend, Backend};
use crate::db::DynDatabasePool;
use crate::models::Account;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const ACCOUNT_COLUMNS: &str =
    "id, username, email, password_hash, is_staff, is_active, created_at, updated_at";

/// Unique key an account is looked up by
#[derive(Clone, Copy)]
enum Lookup<'a> {
    Id(i64),
    Username(&'a str),
    Email(&'a str),
}

impl Lookup<'_> {
    fn column(&self) -> &'static str {
        match self {
            Lookup::Id(_) => "id",
            Lookup::Username(_) => "username",
            Lookup::Email(_) => "email",
        }
    }
}

/// Account repository trait
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Create a new account
    async fn create(&self, account: &Account) -> Result<Account>;

    /// Get account by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Account>>;

    /// Get account by username
    async fn get_by_username(&self, username: &str) -> Result<Option<Account>>;

    /// Get account by email
    async fn get_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Persist username, email, password hash and flags
    async fn update(&self, account: &Account) -> Result<Account>;

    /// Active, non-staff accounts ordered by username
    async fn list_active_workers(&self) -> Result<Vec<Account>>;

    /// Count total accounts
    async fn count(&self) -> Result<i64>;
}

/// SQLx-based account repository implementation
pub struct SqlxAccountRepository {
    pool: DynDatabasePool,
}

impl SqlxAccountRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AccountRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AccountRepository for SqlxAccountRepository {
    async fn create(&self, account: &Account) -> Result<Account> {
        match backend(&self.pool)? {
            Backend::Sqlite(pool) => create_account_sqlite(pool, account).await,
            Backend::Mysql(pool) => create_account_mysql(pool, account).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Account>> {
        match backend(&self.pool)? {
            Backend::Sqlite(pool) => get_account_sqlite(pool, Lookup::Id(id)).await,
            Backend::Mysql(pool) => get_account_mysql(pool, Lookup::Id(id)).await,
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<Account>> {
        match backend(&self.pool)? {
            Backend::Sqlite(pool) => get_account_sqlite(pool, Lookup::Username(username)).await,
            Backend::Mysql(pool) => get_account_mysql(pool, Lookup::Username(username)).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Account>> {
        match backend(&self.pool)? {
            Backend::Sqlite(pool) => get_account_sqlite(pool, Lookup::Email(email)).await,
            Backend::Mysql(pool) => get_account_mysql(pool, Lookup::Email(email)).await,
        }
    }

    async fn update(&self, account: &Account) -> Result<Account> {
        match backend(&self.pool)? {
            Backend::Sqlite(pool) => update_account_sqlite(pool, account).await,
            Backend::Mysql(pool) => update_account_mysql(pool, account).await,
        }
    }

    async fn list_active_workers(&self) -> Result<Vec<Account>> {
        match backend(&self.pool)? {
            Backend::Sqlite(pool) => list_active_workers_sqlite(pool).await,
            Backend::Mysql(pool) => list_active_workers_mysql(pool).await,
        }
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) as count FROM users";
        let count = match backend(&self.pool)? {
            Backend::Sqlite(pool) => sqlx::query(sql).fetch_one(pool).await.map(|r| r.get("count")),
            Backend::Mysql(pool) => sqlx::query(sql).fetch_one(pool).await.map(|r| r.get("count")),
        };
        count.context("Failed to count accounts")
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_account_sqlite(pool: &SqlitePool, account: &Account) -> Result<Account> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, is_staff, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&account.username)
    .bind(&account.email)
    .bind(&account.password_hash)
    .bind(account.is_staff)
    .bind(account.is_active)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create account")?;

    Ok(Account {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..account.clone()
    })
}

async fn get_account_sqlite(pool: &SqlitePool, lookup: Lookup<'_>) -> Result<Option<Account>> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?", ACCOUNT_COLUMNS, lookup.column());
    let query = sqlx::query(&sql);
    let query = match lookup {
        Lookup::Id(id) => query.bind(id),
        Lookup::Username(value) | Lookup::Email(value) => query.bind(value),
    };
    let row = query
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get account by {}", lookup.column()))?;

    Ok(row.as_ref().map(row_to_account_sqlite))
}

async fn update_account_sqlite(pool: &SqlitePool, account: &Account) -> Result<Account> {
    sqlx::query(
        r#"
        UPDATE users
        SET username = ?, email = ?, password_hash = ?, is_staff = ?, is_active = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&account.username)
    .bind(&account.email)
    .bind(&account.password_hash)
    .bind(account.is_staff)
    .bind(account.is_active)
    .bind(Utc::now())
    .bind(account.id)
    .execute(pool)
    .await
    .context("Failed to update account")?;

    get_account_sqlite(pool, Lookup::Id(account.id))
        .await?
        .ok_or_else(|| anyhow::anyhow!("Account not found after update"))
}

async fn list_active_workers_sqlite(pool: &SqlitePool) -> Result<Vec<Account>> {
    let sql = format!(
        "SELECT {} FROM users WHERE is_active = 1 AND is_staff = 0 ORDER BY username",
        ACCOUNT_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list active accounts")?;

    Ok(rows.iter().map(row_to_account_sqlite).collect())
}

fn row_to_account_sqlite(row: &sqlx::sqlite::SqliteRow) -> Account {
    Account {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        is_staff: row.get("is_staff"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_account_mysql(pool: &MySqlPool, account: &Account) -> Result<Account> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, is_staff, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&account.username)
    .bind(&account.email)
    .bind(&account.password_hash)
    .bind(account.is_staff)
    .bind(account.is_active)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create account")?;

    Ok(Account {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..account.clone()
    })
}

async fn get_account_mysql(pool: &MySqlPool, lookup: Lookup<'_>) -> Result<Option<Account>> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?", ACCOUNT_COLUMNS, lookup.column());
    let query = sqlx::query(&sql);
    let query = match lookup {
        Lookup::Id(id) => query.bind(id),
        Lookup::Username(value) | Lookup::Email(value) => query.bind(value),
    };
    let row = query
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get account by {}", lookup.column()))?;

    Ok(row.as_ref().map(row_to_account_mysql))
}

async fn update_account_mysql(pool: &MySqlPool, account: &Account) -> Result<Account> {
    sqlx::query(
        r#"
        UPDATE users
        SET username = ?, email = ?, password_hash = ?, is_staff = ?, is_active = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&account.username)
    .bind(&account.email)
    .bind(&account.password_hash)
    .bind(account.is_staff)
    .bind(account.is_active)
    .bind(Utc::now())
    .bind(account.id)
    .execute(pool)
    .await
    .context("Failed to update account")?;

    get_account_mysql(pool, Lookup::Id(account.id))
        .await?
        .ok_or_else(|| anyhow::anyhow!("Account not found after update"))
}

async fn list_active_workers_mysql(pool: &MySqlPool) -> Result<Vec<Account>> {
    let sql = format!(
        "SELECT {} FROM users WHERE is_active = 1 AND is_staff = 0 ORDER BY username",
        ACCOUNT_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list active accounts")?;

    Ok(rows.iter().map(row_to_account_mysql).collect())
}

fn row_to_account_mysql(row: &sqlx::mysql::MySqlRow) -> Account {
    Account {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        is_staff: row.get::<i8, _>("is_staff") != 0,
        is_active: row.get::<i8, _>("is_active") != 0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, is_unique_violation, migrations};

    async fn setup_test_repo() -> SqlxAccountRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxAccountRepository::new(pool)
    }

    fn account(username: &str) -> Account {
        Account::new(
            username.to_string(),
            format!("{}@example.com", username),
            "hash".to_string(),
        )
    }

    #[tokio::test]
    async fn test_create_and_get_account() {
        let repo = setup_test_repo().await;
        let created = repo.create(&account("alice")).await.unwrap();
        assert!(created.id > 0);

        let found = repo.get_by_id(created.id).await.unwrap().expect("account exists");
        assert_eq!(found.username, "alice");
        assert!(found.is_active);
        assert!(!found.is_staff);
        assert!(repo.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lookups_are_case_insensitive() {
        let repo = setup_test_repo().await;
        repo.create(&account("Alice")).await.unwrap();

        assert!(repo.get_by_username("alice").await.unwrap().is_some());
        assert!(repo.get_by_email("ALICE@example.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_unique_violation() {
        let repo = setup_test_repo().await;
        repo.create(&account("alice")).await.unwrap();

        let mut dup = account("ALICE");
        dup.email = "other@example.com".to_string();
        let err = repo.create(&dup).await.unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_update_flags() {
        let repo = setup_test_repo().await;
        let mut created = repo.create(&account("bob")).await.unwrap();

        created.is_staff = true;
        created.is_active = false;
        let updated = repo.update(&created).await.unwrap();

        assert!(updated.is_staff);
        assert!(!updated.is_active);
    }

    #[tokio::test]
    async fn test_list_active_workers() {
        let repo = setup_test_repo().await;
        repo.create(&account("zed")).await.unwrap();
        repo.create(&account("amy")).await.unwrap();

        let mut staff = account("boss");
        staff.is_staff = true;
        repo.create(&staff).await.unwrap();

        let mut gone = account("gone");
        gone.is_active = false;
        repo.create(&gone).await.unwrap();

        let workers = repo.list_active_workers().await.unwrap();
        let names: Vec<_> = workers.iter().map(|a| a.username.as_str()).collect();
        assert_eq!(names, vec!["amy", "zed"]);
        assert_eq!(repo.count().await.unwrap(), 4);
    }
}
