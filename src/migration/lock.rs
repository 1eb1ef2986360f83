//! Flyway-style migration table-based locking mechanism

use crate::executor::DbExecutor;
use crate::migration::{MigrationError, STATE_TABLE};
use may_postgres::error::SqlState;
use std::time::{Duration, Instant};

/// Reserved version number for the lock record; real migrations use positive timestamps.
const LOCK_VERSION: i64 = -1;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Holds the migration lock; releases it when dropped
pub struct MigrationLockGuard<'a> {
    executor: &'a dyn DbExecutor,
}

impl<'a> MigrationLockGuard<'a> {
    /// Acquire the migration lock, waiting up to `timeout_seconds` (default 60)
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::LockTimeout` if the lock cannot be acquired in time.
    pub fn new(
        executor: &'a dyn DbExecutor,
        timeout_seconds: Option<u64>,
    ) -> Result<Self, MigrationError> {
        acquire_migration_lock(executor, timeout_seconds.unwrap_or(60))?;
        Ok(Self { executor })
    }
}

impl Drop for MigrationLockGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = release_migration_lock(self.executor) {
            log::warn!("failed to release migration lock: {e}");
        }
    }
}

/// Insert the lock record; whoever inserts it holds the lock
///
/// Each attempt runs under a short `statement_timeout`; a cancelled attempt is
/// retried until the overall timeout runs out.
///
/// # Errors
///
/// Returns `MigrationError::LockTimeout` on timeout, or `MigrationError::Database`
/// for any other failure.
pub fn acquire_migration_lock(
    executor: &dyn DbExecutor,
    timeout_seconds: u64,
) -> Result<(), MigrationError> {
    let start = Instant::now();
    let timeout = Duration::from_secs(timeout_seconds);

    executor.execute("SET statement_timeout = '5s'", &[])?;
    let sql = format!(
        "INSERT INTO {STATE_TABLE} (version, name, checksum, applied_at, success) \
         VALUES ({LOCK_VERSION}, 'LOCK', 'lock', NOW(), true) \
         ON CONFLICT (version) DO NOTHING"
    );

    let result = loop {
        if start.elapsed() >= timeout {
            break Err(MigrationError::LockTimeout(format!(
                "Failed to acquire migration lock within {timeout_seconds} seconds. \
                 If no migration is running, delete the lock record: \
                 DELETE FROM {STATE_TABLE} WHERE version = {LOCK_VERSION}"
            )));
        }

        match executor.execute(&sql, &[]) {
            Ok(rows) if rows > 0 => break Ok(()),
            Ok(_) => {}
            Err(e) if e.sql_state() == Some(&SqlState::QUERY_CANCELED) => {}
            Err(e) => break Err(MigrationError::Database(e)),
        }
        may::coroutine::sleep(POLL_INTERVAL);
    };

    if let Err(e) = executor.execute("RESET statement_timeout", &[]) {
        log::warn!("failed to reset statement_timeout after migration lock attempt: {e}");
    }
    result
}

/// Delete the lock record
///
/// # Errors
///
/// Returns `MigrationError::Database` if the delete fails.
pub fn release_migration_lock(executor: &dyn DbExecutor) -> Result<(), MigrationError> {
    let sql = format!("DELETE FROM {STATE_TABLE} WHERE version = {LOCK_VERSION}");
    executor.execute(&sql, &[])?;
    Ok(())
}

/// Check if migration lock is currently held
///
/// # Errors
///
/// Returns `MigrationError::Database` if the lookup fails.
pub fn is_migration_lock_held(executor: &dyn DbExecutor) -> Result<bool, MigrationError> {
    let sql = format!("SELECT 1 FROM {STATE_TABLE} WHERE version = {LOCK_VERSION}");
    Ok(executor.query_opt(&sql, &[])?.is_some())
}
