//! Database fixtures for integration tests.
//!
//! Tests run against the server named by `TEST_DATABASE_URL`. When it is unset,
//! `TestDatabase::from_env` returns `None` and the caller skips. The schema is
//! migrated once per process; tests create their own uniquely named rows
//! instead of truncating shared tables.

use once_cell::sync::OnceCell;

use crate::connection::connect;
use crate::executor::{DbError, PgExecutor};
use crate::migration::{MigrationError, Migrator};
use crate::pool::config::DatabaseConfig;
use crate::pool::manager::DbPool;

pub const TEST_DATABASE_URL: &str = "TEST_DATABASE_URL";

static MIGRATED: OnceCell<usize> = OnceCell::new();

/// Handle on the test database
#[derive(Debug, Clone)]
pub struct TestDatabase {
    url: String,
}

impl TestDatabase {
    /// Connect to `TEST_DATABASE_URL` and bring the schema up to date.
    ///
    /// Returns `Ok(None)` when the variable is unset.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError` if the server is unreachable or a migration fails.
    pub fn from_env() -> Result<Option<Self>, MigrationError> {
        let Ok(url) = std::env::var(TEST_DATABASE_URL) else {
            eprintln!("{TEST_DATABASE_URL} not set; skipping database test");
            return Ok(None);
        };
        let db = Self { url };
        MIGRATED.get_or_try_init(|| {
            let executor = db.executor()?;
            Migrator::embedded().up(&executor, None)
        })?;
        Ok(Some(db))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// A fresh dedicated connection
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the connection cannot be established.
    pub fn executor(&self) -> Result<PgExecutor, DbError> {
        let client = connect(&self.url).map_err(|e| DbError::Other(format!("Connection error: {e}")))?;
        Ok(PgExecutor::new(client))
    }

    /// A pool of `size` connections with the given acquire timeout
    ///
    /// # Errors
    ///
    /// Returns `DbError` if any connection cannot be established.
    pub fn pool(&self, size: usize, timeout_seconds: u64) -> Result<DbPool, DbError> {
        DbPool::connect(&DatabaseConfig {
            url: self.url.clone(),
            max_connections: size,
            pool_timeout_seconds: timeout_seconds,
        })
    }
}
