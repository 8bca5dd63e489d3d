//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for one entity, with a SQLite and a
//! MySQL variant of every statement.

pub mod account;
pub mod hour_limit;
pub mod pay_rate;
pub mod session;
pub mod time_entry;

pub use account::{AccountRepository, SqlxAccountRepository};
pub use hour_limit::{HourLimitRepository, SqlxHourLimitRepository};
pub use pay_rate::{PayRateRepository, SqlxPayRateRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use time_entry::{SqlxTimeEntryRepository, TimeEntryRepository};

use crate::db::DynDatabasePool;
use anyhow::Result;
use sqlx::{MySqlPool, SqlitePool};

/// Concrete pool behind a `DynDatabasePool`
pub(crate) enum Backend<'a> {
    Sqlite(&'a SqlitePool),
    Mysql(&'a MySqlPool),
}

pub(crate) fn backend(pool: &DynDatabasePool) -> Result<Backend<'_>> {
    if let Some(sqlite) = pool.as_sqlite() {
        return Ok(Backend::Sqlite(sqlite));
    }
    if let Some(mysql) = pool.as_mysql() {
        return Ok(Backend::Mysql(mysql));
    }
    anyhow::bail!("Unsupported database pool")
}
