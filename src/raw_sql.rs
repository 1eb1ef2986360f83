//! Raw SQL Helpers
//!
//! Typed wrappers over `DbExecutor`: rows are decoded through `FromRow`, and
//! column decoding failures become `DbError::ParseError` instead of panics.

use crate::executor::{DbError, DbExecutor};
use may_postgres::types::{FromSql, ToSql};
use may_postgres::Row;

/// Decode a domain value from a result row
pub trait FromRow: Sized {
    /// # Errors
    ///
    /// Returns `DbError::ParseError` if a column is missing or has the wrong type.
    fn from_row(row: &Row) -> Result<Self, DbError>;
}

/// Read a named column, reporting decode failures as `DbError::ParseError`
///
/// # Errors
///
/// Returns `DbError::ParseError` if the column is missing or cannot be decoded as `T`.
pub fn column<'a, T: FromSql<'a>>(row: &'a Row, name: &str) -> Result<T, DbError> {
    row.try_get::<&str, T>(name)
        .map_err(|e| DbError::ParseError(format!("column `{name}`: {e}")))
}

/// Execute an unprepared SQL statement with no parameters
///
/// # Errors
///
/// Returns `DbError` if the SQL execution fails.
pub fn execute_unprepared(executor: &dyn DbExecutor, sql: &str) -> Result<u64, DbError> {
    executor.execute(sql, &[])
}

/// Query exactly one row and decode it
///
/// # Errors
///
/// Returns `DbError` if the query fails, does not return exactly one row, or the row cannot be decoded.
pub fn fetch_one<T: FromRow>(
    executor: &dyn DbExecutor,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<T, DbError> {
    T::from_row(&executor.query_one(sql, params)?)
}

/// Query at most one row and decode it
///
/// # Errors
///
/// Returns `DbError` if the query fails, returns several rows, or the row cannot be decoded.
///
/// # Examples
///
/// ```no_run
/// use pantry::raw_sql::fetch_optional;
/// use pantry::models::User;
/// # fn example(db: &dyn pantry::DbExecutor) -> Result<(), pantry::DbError> {
/// let user: Option<User> = fetch_optional(
///     db,
///     "SELECT id, email, name, password_hash, created_at FROM users WHERE lower(email) = lower($1)",
///     &[&"a@example.com"],
/// )?;
/// # Ok(())
/// # }
/// ```
pub fn fetch_optional<T: FromRow>(
    executor: &dyn DbExecutor,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Option<T>, DbError> {
    executor
        .query_opt(sql, params)?
        .map(|row| T::from_row(&row))
        .transpose()
}

/// Query all rows and decode each
///
/// # Errors
///
/// Returns `DbError` if the query fails or any row cannot be decoded.
pub fn fetch_all<T: FromRow>(
    executor: &dyn DbExecutor,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Vec<T>, DbError> {
    executor
        .query_all(sql, params)?
        .iter()
        .map(T::from_row)
        .collect()
}

/// Query a single scalar value from the first column of one row
///
/// # Errors
///
/// Returns `DbError` if the query fails, does not return exactly one row, or the value cannot be decoded.
pub fn query_value<T>(executor: &dyn DbExecutor, sql: &str, params: &[&dyn ToSql]) -> Result<T, DbError>
where
    T: for<'a> FromSql<'a>,
{
    let row = executor.query_one(sql, params)?;
    row.try_get::<usize, T>(0)
        .map_err(|e| DbError::ParseError(format!("Failed to extract value: {e}")))
}

/// Whether a query returns any row
///
/// # Errors
///
/// Returns `DbError` if the query fails.
pub fn exists(executor: &dyn DbExecutor, sql: &str, params: &[&dyn ToSql]) -> Result<bool, DbError> {
    Ok(!executor.query_all(sql, params)?.is_empty())
}
