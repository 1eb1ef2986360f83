use chrono::{DateTime, Utc};
use may_postgres::Row;
use serde::Serialize;
use uuid::Uuid;

use crate::executor::{DbError, DbExecutor};
use crate::raw_sql::{column, fetch_one, fetch_optional, FromRow};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    /// Produced and checked by the authentication boundary; opaque here.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl FromRow for User {
    fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: column(row, "id")?,
            email: column(row, "email")?,
            name: column(row, "name")?,
            password_hash: column(row, "password_hash")?,
            created_at: column(row, "created_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

const COLUMNS: &str = "id, email, name, password_hash, created_at";

pub fn insert(db: &dyn DbExecutor, user: &NewUser) -> Result<User, DbError> {
    fetch_one(
        db,
        &format!("INSERT INTO users (email, name, password_hash) VALUES ($1, $2, $3) RETURNING {COLUMNS}"),
        &[&user.email, &user.name, &user.password_hash],
    )
}

pub fn find_by_id(db: &dyn DbExecutor, id: Uuid) -> Result<Option<User>, DbError> {
    fetch_optional(db, &format!("SELECT {COLUMNS} FROM users WHERE id = $1"), &[&id])
}

pub fn find_by_email(db: &dyn DbExecutor, email: &str) -> Result<Option<User>, DbError> {
    fetch_optional(
        db,
        &format!("SELECT {COLUMNS} FROM users WHERE lower(email) = lower($1)"),
        &[&email],
    )
}
