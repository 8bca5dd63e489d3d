//! Time entry repository
//!
//! Reads go through a single filtered query (`EntryFilter`) that joins the
//! owner's username; every listing is ordered newest clock-in first.
//! Writes always scope by owner so one account can never touch another's rows.

use super::{backend, Backend};
use crate::db::DynDatabasePool;
use crate::models::{TimeEntry, TimeEntryWithUser};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Open/closed selector for [`EntryFilter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Open,
    Closed,
}

/// Which time entries a listing should return
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub state: Option<EntryState>,
    /// Inclusive lower bound on `clock_in`
    pub clock_in_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `clock_in`
    pub clock_in_before: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl EntryFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_user(user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn open(mut self) -> Self {
        self.state = Some(EntryState::Open);
        self
    }

    pub fn closed(mut self) -> Self {
        self.state = Some(EntryState::Closed);
        self
    }

    /// Entries whose clock-in lies in `[start, end)`
    pub fn clocked_in_between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.clock_in_from = Some(start);
        self.clock_in_before = Some(end);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

enum BindValue {
    Int(i64),
    Time(DateTime<Utc>),
}

/// Time entry repository trait
#[async_trait]
pub trait TimeEntryRepository: Send + Sync {
    /// Insert an entry; fails with a unique violation if it would be a
    /// second open entry for the same account
    async fn create(&self, entry: &TimeEntry) -> Result<TimeEntry>;

    /// Overwrite times and description of an entry owned by `entry.user_id`.
    /// Returns `None` when no such entry exists.
    async fn update(&self, entry: &TimeEntry) -> Result<Option<TimeEntry>>;

    /// Set `clock_out` on an entry owned by `user_id` only while it is still
    /// open. Returns `None` when the entry is missing, foreign or already closed.
    async fn close_open_for_user(
        &self,
        user_id: i64,
        id: i64,
        clock_out: DateTime<Utc>,
    ) -> Result<Option<TimeEntry>>;

    /// Delete an entry owned by `user_id`, returning whether a row went away
    async fn delete_for_user(&self, user_id: i64, id: i64) -> Result<bool>;

    /// Entries matching `filter`, newest clock-in first
    async fn list(&self, filter: &EntryFilter) -> Result<Vec<TimeEntryWithUser>>;

    /// One entry owned by `user_id`
    async fn get_for_user(&self, user_id: i64, id: i64) -> Result<Option<TimeEntry>> {
        let rows = self.list(&EntryFilter::for_user(user_id).with_id(id).limit(1)).await?;
        Ok(rows.into_iter().next().map(|row| row.entry))
    }

    /// Most recent open entry of `user_id`
    async fn get_open_for_user(&self, user_id: i64) -> Result<Option<TimeEntry>> {
        let rows = self.list(&EntryFilter::for_user(user_id).open().limit(1)).await?;
        Ok(rows.into_iter().next().map(|row| row.entry))
    }
}

/// SQLx-based time entry repository implementation
pub struct SqlxTimeEntryRepository {
    pool: DynDatabasePool,
}

impl SqlxTimeEntryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TimeEntryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TimeEntryRepository for SqlxTimeEntryRepository {
    async fn create(&self, entry: &TimeEntry) -> Result<TimeEntry> {
        match backend(&self.pool)? {
            Backend::Sqlite(pool) => create_entry_sqlite(pool, entry).await,
            Backend::Mysql(pool) => create_entry_mysql(pool, entry).await,
        }
    }

    async fn update(&self, entry: &TimeEntry) -> Result<Option<TimeEntry>> {
        let sql = r#"
            UPDATE time_entries
            SET clock_in = ?, clock_out = ?, description = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
        "#;
        let now = Utc::now();
        let result = match backend(&self.pool)? {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(entry.clock_in)
                .bind(entry.clock_out)
                .bind(&entry.description)
                .bind(now)
                .bind(entry.id)
                .bind(entry.user_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(entry.clock_in)
                .bind(entry.clock_out)
                .bind(&entry.description)
                .bind(now)
                .bind(entry.id)
                .bind(entry.user_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
        };
        let affected = result.context("Failed to update time entry")?;

        if affected == 0 {
            return Ok(None);
        }
        self.get_for_user(entry.user_id, entry.id).await
    }

    async fn close_open_for_user(
        &self,
        user_id: i64,
        id: i64,
        clock_out: DateTime<Utc>,
    ) -> Result<Option<TimeEntry>> {
        let sql = r#"
            UPDATE time_entries
            SET clock_out = ?, updated_at = ?
            WHERE id = ? AND user_id = ? AND clock_out IS NULL
        "#;
        let now = Utc::now();
        let result = match backend(&self.pool)? {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(clock_out)
                .bind(now)
                .bind(id)
                .bind(user_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(clock_out)
                .bind(now)
                .bind(id)
                .bind(user_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
        };
        let affected = result.context("Failed to close time entry")?;

        if affected == 0 {
            return Ok(None);
        }
        self.get_for_user(user_id, id).await
    }

    async fn delete_for_user(&self, user_id: i64, id: i64) -> Result<bool> {
        let sql = "DELETE FROM time_entries WHERE id = ? AND user_id = ?";
        let result = match backend(&self.pool)? {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(id)
                .bind(user_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(id)
                .bind(user_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
        };
        Ok(result.context("Failed to delete time entry")? > 0)
    }

    async fn list(&self, filter: &EntryFilter) -> Result<Vec<TimeEntryWithUser>> {
        let (sql, binds) = build_select(filter);
        match backend(&self.pool)? {
            Backend::Sqlite(pool) => list_entries_sqlite(pool, &sql, binds).await,
            Backend::Mysql(pool) => list_entries_mysql(pool, &sql, binds).await,
        }
    }
}

/// Build the filtered SELECT; both backends share `?` placeholders
fn build_select(filter: &EntryFilter) -> (String, Vec<BindValue>) {
    let mut sql = String::from(
        "SELECT e.id, e.user_id, e.clock_in, e.clock_out, e.description, e.created_at, e.updated_at, \
         u.username FROM time_entries e JOIN users u ON u.id = e.user_id WHERE 1 = 1",
    );
    let mut binds = Vec::new();

    if let Some(id) = filter.id {
        sql.push_str(" AND e.id = ?");
        binds.push(BindValue::Int(id));
    }
    if let Some(user_id) = filter.user_id {
        sql.push_str(" AND e.user_id = ?");
        binds.push(BindValue::Int(user_id));
    }
    match filter.state {
        Some(EntryState::Open) => sql.push_str(" AND e.clock_out IS NULL"),
        Some(EntryState::Closed) => sql.push_str(" AND e.clock_out IS NOT NULL"),
        None => {}
    }
    if let Some(from) = filter.clock_in_from {
        sql.push_str(" AND e.clock_in >= ?");
        binds.push(BindValue::Time(from));
    }
    if let Some(before) = filter.clock_in_before {
        sql.push_str(" AND e.clock_in < ?");
        binds.push(BindValue::Time(before));
    }

    sql.push_str(" ORDER BY e.clock_in DESC, e.id DESC");

    if let Some(limit) = filter.limit {
        sql.push_str(" LIMIT ?");
        binds.push(BindValue::Int(limit));
    }

    (sql, binds)
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_entry_sqlite(pool: &SqlitePool, entry: &TimeEntry) -> Result<TimeEntry> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO time_entries (user_id, clock_in, clock_out, description, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.user_id)
    .bind(entry.clock_in)
    .bind(entry.clock_out)
    .bind(&entry.description)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create time entry")?;

    Ok(TimeEntry {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..entry.clone()
    })
}

async fn list_entries_sqlite(
    pool: &SqlitePool,
    sql: &str,
    binds: Vec<BindValue>,
) -> Result<Vec<TimeEntryWithUser>> {
    let mut query = sqlx::query(sql);
    for value in binds {
        query = match value {
            BindValue::Int(v) => query.bind(v),
            BindValue::Time(t) => query.bind(t),
        };
    }

    let rows = query.fetch_all(pool).await.context("Failed to list time entries")?;
    Ok(rows.iter().map(row_to_entry_sqlite).collect())
}

fn row_to_entry_sqlite(row: &sqlx::sqlite::SqliteRow) -> TimeEntryWithUser {
    TimeEntryWithUser {
        entry: TimeEntry {
            id: row.get("id"),
            user_id: row.get("user_id"),
            clock_in: row.get("clock_in"),
            clock_out: row.get("clock_out"),
            description: row.get("description"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        },
        username: row.get("username"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_entry_mysql(pool: &MySqlPool, entry: &TimeEntry) -> Result<TimeEntry> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO time_entries (user_id, clock_in, clock_out, description, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.user_id)
    .bind(entry.clock_in)
    .bind(entry.clock_out)
    .bind(&entry.description)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create time entry")?;

    Ok(TimeEntry {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..entry.clone()
    })
}

async fn list_entries_mysql(
    pool: &MySqlPool,
    sql: &str,
    binds: Vec<BindValue>,
) -> Result<Vec<TimeEntryWithUser>> {
    let mut query = sqlx::query(sql);
    for value in binds {
        query = match value {
            BindValue::Int(v) => query.bind(v),
            BindValue::Time(t) => query.bind(t),
        };
    }

    let rows = query.fetch_all(pool).await.context("Failed to list time entries")?;
    Ok(rows.iter().map(row_to_entry_mysql).collect())
}

fn row_to_entry_mysql(row: &sqlx::mysql::MySqlRow) -> TimeEntryWithUser {
    TimeEntryWithUser {
        entry: TimeEntry {
            id: row.get("id"),
            user_id: row.get("user_id"),
            clock_in: row.get("clock_in"),
            clock_out: row.get("clock_out"),
            description: row.get("description"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        },
        username: row.get("username"),
    }
}
