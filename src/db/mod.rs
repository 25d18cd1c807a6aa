//! Database layer
//!
//! Supports SQLite (default, single-file deployment) and MySQL. The backend is
//! chosen by configuration and hidden behind the `DatabasePool` trait.
//!
//! # Usage
//!
//! ```ignore
//! use yatube::config::DatabaseConfig;
//! use yatube::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

/// Run the same query code against whichever backend `$db` wraps.
///
/// The body is expanded once per driver with `$pool` bound to the concrete
/// sqlx pool, so every query in it is type-checked for both databases.
macro_rules! on_pool {
    ($db:expr, $pool:ident => $body:expr) => {
        match $db.driver() {
            $crate::config::DatabaseDriver::Sqlite => {
                let $pool = $db
                    .as_sqlite()
                    .ok_or_else(|| anyhow::anyhow!("SQLite pool unavailable"))?;
                $body
            }
            $crate::config::DatabaseDriver::Mysql => {
                let $pool = $db
                    .as_mysql()
                    .ok_or_else(|| anyhow::anyhow!("MySQL pool unavailable"))?;
                $body
            }
        }
    };
}

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};

/// Auto-increment id of the row an INSERT just created
pub(crate) trait LastInsertId {
    fn last_id(&self) -> i64;
}

impl LastInsertId for sqlx::sqlite::SqliteQueryResult {
    fn last_id(&self) -> i64 {
        self.last_insert_rowid()
    }
}

impl LastInsertId for sqlx::mysql::MySqlQueryResult {
    fn last_id(&self) -> i64 {
        self.last_insert_id() as i64
    }
}

/// Whether an error (or anything in its source chain) is a unique-constraint violation
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<sqlx::Error>()
            .and_then(|e| e.as_database_error())
            .is_some_and(|db| db.is_unique_violation())
    })
}
