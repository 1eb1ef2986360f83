//! Migration status tracking

use crate::migration::MigrationRecord;

/// Applied versus pending migrations
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Applied migrations (from the state table)
    pub applied: Vec<MigrationRecord>,
    /// Migrations known to this build but not yet applied, in version order
    pub pending: Vec<PendingMigration>,
}

/// A migration that has not been applied yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMigration {
    pub version: i64,
    pub name: String,
    pub checksum: String,
}

impl MigrationStatus {
    /// Check if all migrations are applied
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }

    /// Get the latest applied migration version
    #[must_use]
    pub fn latest_applied_version(&self) -> Option<i64> {
        self.applied.iter().map(|m| m.version).max()
    }
}
