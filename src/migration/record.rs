//! `MigrationRecord` - entries in the `pantry_migrations` state table

use chrono::{DateTime, Utc};
use may_postgres::Row;

use crate::executor::DbError;
use crate::raw_sql::{column, FromRow};

/// One applied migration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    /// `SHA-256` checksum of the migration's rendered SQL
    pub checksum: String,
    pub applied_at: DateTime<Utc>,
    pub execution_time_ms: Option<i64>,
    pub success: bool,
}

impl FromRow for MigrationRecord {
    fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            version: column(row, "version")?,
            name: column(row, "name")?,
            checksum: column(row, "checksum")?,
            applied_at: column(row, "applied_at")?,
            execution_time_ms: column(row, "execution_time_ms")?,
            success: column(row, "success")?,
        })
    }
}
