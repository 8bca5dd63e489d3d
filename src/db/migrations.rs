//! Database migrations
//!
//! Migrations are embedded in the binary as SQL strings, one variant per
//! backend, and recorded in the `_migrations` table once applied.
//!
//! ```ignore
//! let pool = create_pool(&config.database).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (unique, ascending)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username VARCHAR(150) NOT NULL UNIQUE COLLATE NOCASE,
                email VARCHAR(254) NOT NULL UNIQUE COLLATE NOCASE,
                password_hash VARCHAR(255) NOT NULL,
                is_staff INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                username VARCHAR(150) NOT NULL UNIQUE,
                email VARCHAR(254) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                is_staff TINYINT NOT NULL DEFAULT 0,
                is_active TINYINT NOT NULL DEFAULT 1,
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL
            );
        "#,
    },
    Migration {
        version: 2,
        name: "create_sessions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id INTEGER NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id BIGINT NOT NULL,
                expires_at DATETIME(6) NOT NULL,
                created_at DATETIME(6) NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX idx_sessions_expires_at ON sessions(expires_at);
        "#,
    },
    Migration {
        version: 3,
        name: "create_pay_rates",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS pay_rates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL UNIQUE,
                hourly_rate REAL NOT NULL CHECK (hourly_rate >= 0),
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS pay_rates (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                user_id BIGINT NOT NULL UNIQUE,
                hourly_rate DOUBLE NOT NULL CHECK (hourly_rate >= 0),
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
        "#,
    },
    Migration {
        version: 4,
        name: "create_hour_limits",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS hour_limits (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                period VARCHAR(10) NOT NULL UNIQUE CHECK (period IN ('weekly', 'monthly')),
                max_hours REAL NOT NULL CHECK (max_hours >= 0),
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS hour_limits (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                period VARCHAR(10) NOT NULL UNIQUE CHECK (period IN ('weekly', 'monthly')),
                max_hours DOUBLE NOT NULL CHECK (max_hours >= 0),
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL
            );
        "#,
    },
    // One open entry per user: SQLite uses a partial unique index, MySQL a
    // generated marker column that is NULL for closed entries.
    Migration {
        version: 5,
        name: "create_time_entries",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS time_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                clock_in TIMESTAMP NOT NULL,
                clock_out TIMESTAMP,
                description TEXT NOT NULL DEFAULT '',
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                CHECK (clock_out IS NULL OR clock_out > clock_in)
            );
            CREATE INDEX IF NOT EXISTS idx_time_entries_user_clock_in ON time_entries(user_id, clock_in);
            CREATE INDEX IF NOT EXISTS idx_time_entries_clock_in ON time_entries(clock_in);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_time_entries_one_open
                ON time_entries(user_id) WHERE clock_out IS NULL;
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS time_entries (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                user_id BIGINT NOT NULL,
                clock_in DATETIME(6) NOT NULL,
                clock_out DATETIME(6) NULL,
                description TEXT NOT NULL,
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL,
                open_marker TINYINT AS (IF(clock_out IS NULL, 1, NULL)) STORED,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                CONSTRAINT chk_time_entries_order CHECK (clock_out IS NULL OR clock_out > clock_in),
                UNIQUE KEY uk_time_entries_one_open (user_id, open_marker)
            );
            CREATE INDEX idx_time_entries_user_clock_in ON time_entries(user_id, clock_in);
            CREATE INDEX idx_time_entries_clock_in ON time_entries(clock_in);
        "#,
    },
];

/// Run all pending migrations, returning how many were applied
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i32> = applied.iter().map(|m| m.version as i32).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!("Applying migration {}: {}", migration.version, migration.name);
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at DATETIME(6) NOT NULL
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    if let Some(sqlite) = pool.as_sqlite() {
        return get_applied_migrations_sqlite(sqlite).await;
    }
    if let Some(mysql) = pool.as_mysql() {
        return get_applied_migrations_mysql(mysql).await;
    }
    anyhow::bail!("Unsupported database pool")
}

async fn get_applied_migrations_sqlite(pool: &SqlitePool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn get_applied_migrations_mysql(pool: &MySqlPool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| MigrationRecord {
            version: row.get::<i32, _>("version") as i64,
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    if let Some(sqlite) = pool.as_sqlite() {
        for statement in split_sql_statements(migration.up_sqlite) {
            sqlx::query(statement)
                .execute(sqlite)
                .await
                .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
        }
        sqlx::query("INSERT INTO _migrations (version, name, applied_at) VALUES (?, ?, ?)")
            .bind(migration.version)
            .bind(migration.name)
            .bind(Utc::now())
            .execute(sqlite)
            .await?;
        return Ok(());
    }

    if let Some(mysql) = pool.as_mysql() {
        for statement in split_sql_statements(migration.up_mysql) {
            sqlx::query(statement)
                .execute(mysql)
                .await
                .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
        }
        sqlx::query("INSERT INTO _migrations (version, name, applied_at) VALUES (?, ?, ?)")
            .bind(migration.version)
            .bind(migration.name)
            .bind(Utc::now())
            .execute(mysql)
            .await?;
        return Ok(());
    }

    anyhow::bail!("Unsupported database pool")
}

fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual statements, dropping comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// Number of migrations not yet applied
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;
    let applied = get_applied_migrations(pool).await?;
    Ok(MIGRATIONS.len().saturating_sub(applied.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    async fn migrated_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        pool
    }

    async fn insert_user(pool: &SqlitePool, username: &str) -> i64 {
        sqlx::query(
            "INSERT INTO users (username, email, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(username)
        .bind(format!("{}@example.com", username))
        .bind("hash")
        .bind(Utc::now())
        .bind(Utc::now())
        .execute(pool)
        .await
        .expect("Failed to create user")
        .last_insert_rowid()
    }

    #[tokio::test]
    async fn test_run_migrations_is_idempotent() {
        let pool = create_test_pool().await.unwrap();

        assert_eq!(pending_count(&pool).await.unwrap(), MIGRATIONS.len());
        let count = run_migrations(&pool).await.unwrap();
        assert_eq!(count, MIGRATIONS.len());

        assert_eq!(run_migrations(&pool).await.unwrap(), 0);
        assert_eq!(pending_count(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_username_is_unique_case_insensitively() {
        let pool = migrated_pool().await;
        let sqlite = pool.as_sqlite().unwrap();
        insert_user(sqlite, "alice").await;

        let result = sqlx::query(
            "INSERT INTO users (username, email, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind("ALICE")
        .bind("other@example.com")
        .bind("hash")
        .bind(Utc::now())
        .bind(Utc::now())
        .execute(sqlite)
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_time_entry_order_check() {
        let pool = migrated_pool().await;
        let sqlite = pool.as_sqlite().unwrap();
        let user_id = insert_user(sqlite, "bob").await;

        let clock_in = Utc::now();
        let result = sqlx::query(
            "INSERT INTO time_entries (user_id, clock_in, clock_out, description, created_at, updated_at) VALUES (?, ?, ?, '', ?, ?)",
        )
        .bind(user_id)
        .bind(clock_in)
        .bind(clock_in - chrono::Duration::hours(1))
        .bind(clock_in)
        .bind(clock_in)
        .execute(sqlite)
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_only_one_open_entry_per_user() {
        let pool = migrated_pool().await;
        let sqlite = pool.as_sqlite().unwrap();
        let bob = insert_user(sqlite, "bob").await;
        let carol = insert_user(sqlite, "carol").await;

        let insert_open = |user_id: i64| {
            let now = Utc::now();
            sqlx::query(
                "INSERT INTO time_entries (user_id, clock_in, description, created_at, updated_at) VALUES (?, ?, '', ?, ?)",
            )
            .bind(user_id)
            .bind(now)
            .bind(now)
            .bind(now)
            .execute(sqlite)
        };

        assert!(insert_open(bob).await.is_ok());
        assert!(insert_open(carol).await.is_ok());
        assert!(insert_open(bob).await.is_err());
    }

    #[tokio::test]
    async fn test_hour_limit_period_is_unique() {
        let pool = migrated_pool().await;
        let sqlite = pool.as_sqlite().unwrap();

        let insert = || {
            sqlx::query(
                "INSERT INTO hour_limits (period, max_hours, created_at, updated_at) VALUES ('weekly', 40, ?, ?)",
            )
            .bind(Utc::now())
            .bind(Utc::now())
            .execute(sqlite)
        };

        assert!(insert().await.is_ok());
        assert!(insert().await.is_err());
    }

    #[tokio::test]
    async fn test_pay_rate_requires_existing_user() {
        let pool = migrated_pool().await;
        let sqlite = pool.as_sqlite().unwrap();

        let result = sqlx::query(
            "INSERT INTO pay_rates (user_id, hourly_rate, created_at, updated_at) VALUES (999, 20, ?, ?)",
        )
        .bind(Utc::now())
        .bind(Utc::now())
        .execute(sqlite)
        .await;

        assert!(result.is_err());
    }

    #[test]
    fn test_split_sql_statements() {
        let statements = split_sql_statements("CREATE TABLE a (id INT); CREATE TABLE b (id INT);");
        assert_eq!(statements.len(), 2);

        let statements = split_sql_statements("-- Comment\nCREATE TABLE a (id INT);\n-- trailing");
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn test_is_comment_only() {
        assert!(is_comment_only("-- Line 1\n-- Line 2"));
        assert!(!is_comment_only("-- Comment\nCREATE TABLE test"));
    }
}
