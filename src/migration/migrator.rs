//! Migrator - Core migration execution engine

use crate::executor::DbExecutor;
use crate::migration::lock::MigrationLockGuard;
use crate::migration::{
    calculate_checksum, initialize_state_table, schema, Migration, MigrationError,
    MigrationRecord, MigrationStatus, PendingMigration, SchemaManager, STATE_TABLE,
};
use crate::raw_sql::fetch_all;
use chrono::Utc;
use std::collections::HashSet;
use std::time::Instant;

/// Orchestrates validation, execution and state tracking of migrations
pub struct Migrator {
    migrations: Vec<Box<dyn Migration>>,
}

impl Migrator {
    /// Build a migrator over an explicit migration list (sorted by version here)
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::InvalidVersion` for duplicate or non-positive versions.
    pub fn new(mut migrations: Vec<Box<dyn Migration>>) -> Result<Self, MigrationError> {
        migrations.sort_by_key(|m| m.version());
        let mut seen = HashSet::new();
        for migration in &migrations {
            if migration.version() <= 0 || !seen.insert(migration.version()) {
                return Err(MigrationError::InvalidVersion(migration.version()));
            }
        }
        Ok(Self { migrations })
    }

    /// The migrations that define the pantry schema
    pub fn embedded() -> Self {
        // Versions in `schema::all()` are distinct, positive and ascending.
        Self {
            migrations: schema::all(),
        }
    }

    /// Known migrations in version order
    pub fn migrations(&self) -> &[Box<dyn Migration>] {
        &self.migrations
    }

    /// Compare known migrations with the state table
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::ChecksumMismatch` if an applied migration changed,
    /// `MigrationError::UnknownAppliedVersion` if the database is ahead of this build,
    /// or `MigrationError::Database` on query failure.
    pub fn status(&self, executor: &dyn DbExecutor) -> Result<MigrationStatus, MigrationError> {
        initialize_state_table(executor)?;
        let applied = Self::query_applied_migrations(executor)?;

        let known: HashSet<i64> = self.migrations.iter().map(|m| m.version()).collect();
        if let Some(record) = applied.iter().find(|r| !known.contains(&r.version)) {
            return Err(MigrationError::UnknownAppliedVersion {
                version: record.version,
                name: record.name.clone(),
            });
        }

        let mut applied_records = Vec::new();
        let mut pending = Vec::new();
        for migration in &self.migrations {
            let checksum = calculate_checksum(migration.as_ref());
            match applied.iter().find(|r| r.version == migration.version()) {
                Some(record) if record.checksum != checksum => {
                    return Err(MigrationError::ChecksumMismatch {
                        version: record.version,
                        name: record.name.clone(),
                        stored: record.checksum.clone(),
                        current: checksum,
                    });
                }
                Some(record) => applied_records.push(record.clone()),
                None => pending.push(PendingMigration {
                    version: migration.version(),
                    name: migration.name().to_string(),
                    checksum,
                }),
            }
        }

        Ok(MigrationStatus {
            applied: applied_records,
            pending,
        })
    }

    /// Apply pending migrations, each in its own transaction
    ///
    /// # Arguments
    ///
    /// * `executor` - The database executor
    /// * `steps` - Number of migrations to apply (None = all pending)
    ///
    /// # Errors
    ///
    /// Returns `MigrationError` if the lock cannot be taken, validation fails, or a
    /// migration fails (that migration is rolled back; earlier ones stay applied).
    pub fn up(&self, executor: &dyn DbExecutor, steps: Option<usize>) -> Result<usize, MigrationError> {
        initialize_state_table(executor)?;
        let _lock = MigrationLockGuard::new(executor, Some(60))?;

        let status = self.status(executor)?;
        let take = steps.unwrap_or(status.pending.len());

        let mut applied_count = 0;
        for pending in status.pending.iter().take(take) {
            let Some(migration) = self.migrations.iter().find(|m| m.version() == pending.version) else {
                continue;
            };
            let start = Instant::now();

            let tx = executor.begin()?;
            migration
                .up(&SchemaManager::new(&tx))
                .map_err(|e| MigrationError::ExecutionFailed {
                    version: pending.version,
                    name: pending.name.clone(),
                    error: e.to_string(),
                })?;

            let record = MigrationRecord {
                version: pending.version,
                name: pending.name.clone(),
                checksum: pending.checksum.clone(),
                applied_at: Utc::now(),
                execution_time_ms: i64::try_from(start.elapsed().as_millis()).ok(),
                success: true,
            };
            Self::record_migration(&tx, &record)?;
            tx.commit()?;

            log::info!("applied migration {} ({})", record.version, record.name);
            applied_count += 1;
        }

        Ok(applied_count)
    }

    /// Applied migrations, excluding the lock record (version = -1)
    fn query_applied_migrations(
        executor: &dyn DbExecutor,
    ) -> Result<Vec<MigrationRecord>, MigrationError> {
        let sql = format!(
            "SELECT version, name, checksum, applied_at, execution_time_ms, success \
             FROM {STATE_TABLE} WHERE version > 0 ORDER BY version ASC"
        );
        Ok(fetch_all(executor, &sql, &[])?)
    }

    fn record_migration(
        executor: &dyn DbExecutor,
        record: &MigrationRecord,
    ) -> Result<(), MigrationError> {
        let sql = format!(
            "INSERT INTO {STATE_TABLE} (version, name, checksum, applied_at, execution_time_ms, success) \
             VALUES ($1, $2, $3, $4, $5, $6)"
        );
        executor.execute(
            &sql,
            &[
                &record.version,
                &record.name,
                &record.checksum,
                &record.applied_at,
                &record.execution_time_ms,
                &record.success,
            ],
        )?;
        Ok(())
    }
}
