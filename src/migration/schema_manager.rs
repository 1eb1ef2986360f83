//! SchemaManager - Provides methods for schema operations in migrations

use super::migration::SchemaStatement;
use crate::executor::{DbError, DbExecutor};
use sea_query::{IndexCreateStatement, PostgresQueryBuilder, TableAlterStatement, TableCreateStatement};

/// Wraps a `DbExecutor` with the schema operations migrations need
pub struct SchemaManager<'a> {
    executor: &'a dyn DbExecutor,
}

impl<'a> SchemaManager<'a> {
    /// Create a new SchemaManager over the given executor
    pub fn new(executor: &'a dyn DbExecutor) -> Self {
        Self { executor }
    }

    /// Create a table
    ///
    /// # Example
    /// ```rust,no_run
    /// use sea_query::{ColumnDef, Table};
    /// # fn run(manager: &pantry::migration::SchemaManager<'_>) -> Result<(), pantry::DbError> {
    /// let table = Table::create()
    ///     .table("sellers")
    ///     .col(ColumnDef::new("id").uuid().not_null().primary_key())
    ///     .col(ColumnDef::new("name").text().not_null())
    ///     .to_owned();
    /// manager.create_table(table)?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the statement fails.
    pub fn create_table(&self, table: TableCreateStatement) -> Result<(), DbError> {
        let sql = table.build(PostgresQueryBuilder);
        self.executor.execute(&sql, &[]).map(|_| ())
    }

    /// Alter an existing table
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the statement fails.
    pub fn alter_table(&self, alter: TableAlterStatement) -> Result<(), DbError> {
        let sql = alter.build(PostgresQueryBuilder);
        self.executor.execute(&sql, &[]).map(|_| ())
    }

    /// Create an index
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the statement fails.
    pub fn create_index(&self, index: IndexCreateStatement) -> Result<(), DbError> {
        let sql = index.build(PostgresQueryBuilder);
        self.executor.execute(&sql, &[]).map(|_| ())
    }

    /// Execute raw DDL
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the statement fails.
    pub fn execute_raw(&self, sql: &str) -> Result<(), DbError> {
        self.executor.execute(sql, &[]).map(|_| ())
    }

    /// Apply one migration statement
    ///
    /// # Errors
    ///
    /// Returns `DbError` if the statement fails.
    pub fn apply(&self, statement: &SchemaStatement) -> Result<(), DbError> {
        match statement {
            SchemaStatement::Table(table) => self.create_table(table.clone()),
            SchemaStatement::Alter(alter) => self.alter_table(alter.clone()),
            SchemaStatement::Index(index) => self.create_index(index.clone()),
            SchemaStatement::Raw(sql) => self.execute_raw(sql),
        }
    }

    /// Get a reference to the underlying executor
    pub fn executor(&self) -> &dyn DbExecutor {
        self.executor
    }
}
