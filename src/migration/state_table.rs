//! Migration state table management

use crate::executor::{DbError, DbExecutor};
use crate::migration::STATE_TABLE;
use sea_query::{ColumnDef, Expr, Index, IndexCreateStatement, Table, TableCreateStatement};

/// Serializes concurrent first-time creation of the state table across processes.
const STATE_TABLE_ADVISORY_KEY: i64 = 0x7061_6e74_7279;

/// `pantry_migrations` table: version, name, checksum, applied_at, execution time, success
pub fn create_state_table() -> TableCreateStatement {
    Table::create()
        .table(STATE_TABLE)
        .if_not_exists()
        .col(ColumnDef::new("version").big_integer().not_null().primary_key())
        .col(ColumnDef::new("name").string().string_len(255).not_null())
        .col(ColumnDef::new("checksum").string().string_len(64).not_null())
        .col(ColumnDef::new("applied_at").timestamp_with_time_zone().not_null())
        .col(ColumnDef::new("execution_time_ms").big_integer().null())
        .col(ColumnDef::new("success").boolean().not_null().default(false))
        .to_owned()
}

/// Index on `applied_at` for status queries
pub fn create_state_table_index() -> IndexCreateStatement {
    Index::create()
        .if_not_exists()
        .name("idx_pantry_migrations_applied_at")
        .table(STATE_TABLE)
        .col(Expr::col("applied_at"))
        .to_owned()
}

/// Create the state table and its index if they don't exist
///
/// # Errors
///
/// Returns `DbError` if either statement fails.
pub fn initialize_state_table(executor: &dyn DbExecutor) -> Result<(), DbError> {
    let tx = executor.begin()?;
    tx.execute("SELECT pg_advisory_xact_lock($1)", &[&STATE_TABLE_ADVISORY_KEY])?;
    tx.execute(&create_state_table().build(sea_query::PostgresQueryBuilder), &[])?;
    tx.execute(&create_state_table_index().build(sea_query::PostgresQueryBuilder), &[])?;
    tx.commit()?;
    Ok(())
}
