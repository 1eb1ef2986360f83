//! Migration trait definition

use super::schema_manager::SchemaManager;
use crate::executor::DbError;
use sea_query::{IndexCreateStatement, PostgresQueryBuilder, TableAlterStatement, TableCreateStatement};

/// One schema change inside a migration
#[derive(Debug, Clone)]
pub enum SchemaStatement {
    Table(TableCreateStatement),
    Alter(TableAlterStatement),
    Index(IndexCreateStatement),
    /// DDL sea-query cannot express (partial/expression indexes, constraints)
    Raw(String),
}

impl SchemaStatement {
    /// Render as PostgreSQL DDL
    pub fn to_sql(&self) -> String {
        match self {
            SchemaStatement::Table(table) => table.build(PostgresQueryBuilder),
            SchemaStatement::Alter(alter) => alter.build(PostgresQueryBuilder),
            SchemaStatement::Index(index) => index.build(PostgresQueryBuilder),
            SchemaStatement::Raw(sql) => sql.clone(),
        }
    }
}

/// Trait that all migrations must implement
///
/// A migration is an ordered list of schema statements. The rendered SQL of
/// those statements is what gets checksummed, so editing an applied migration
/// is detected on the next run.
pub trait Migration: Send + Sync {
    /// Human-readable identifier
    fn name(&self) -> &str;

    /// Version (timestamp: YYYYMMDDHHMMSS)
    fn version(&self) -> i64;

    /// The statements this migration applies, in order
    fn statements(&self) -> Vec<SchemaStatement>;

    /// Apply the migration
    ///
    /// # Errors
    ///
    /// Returns `DbError` from the first statement that fails.
    fn up(&self, manager: &SchemaManager<'_>) -> Result<(), DbError> {
        for statement in self.statements() {
            manager.apply(&statement)?;
        }
        Ok(())
    }
}
