//! Database layer
//!
//! SQLite is the default backend; MySQL can be selected in configuration.
//! Both sit behind the `DatabasePool` trait, and repositories dispatch to the
//! backend-specific query functions at runtime.
//!
//! ```ignore
//! let pool = create_pool(&config.database).await?;
//! migrations::run_migrations(&pool).await?;
//!
//! if let Some(sqlite_pool) = pool.as_sqlite() {
//!     // SQLite-specific operations
//! }
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, is_check_violation, is_unique_violation, DatabasePool,
    DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
