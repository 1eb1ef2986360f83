use chrono::{DateTime, Utc};
use may_postgres::Row;
use serde::Serialize;
use uuid::Uuid;

use crate::executor::{DbError, DbExecutor};
use crate::pool::config::Page;
use crate::raw_sql::{column, fetch_all, fetch_one, fetch_optional, FromRow};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inventory {
    pub id: Uuid,
    pub name: String,
    pub owner_user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl FromRow for Inventory {
    fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: column(row, "id")?,
            name: column(row, "name")?,
            owner_user_id: column(row, "owner_user_id")?,
            created_at: column(row, "created_at")?,
        })
    }
}

const COLUMNS: &str = "id, name, owner_user_id, created_at";

pub fn insert(db: &dyn DbExecutor, name: &str, owner: Uuid) -> Result<Inventory, DbError> {
    fetch_one(
        db,
        &format!("INSERT INTO inventories (name, owner_user_id) VALUES ($1, $2) RETURNING {COLUMNS}"),
        &[&name, &owner],
    )
}

/// A non-deleted inventory
pub fn find_live(db: &dyn DbExecutor, id: Uuid) -> Result<Option<Inventory>, DbError> {
    fetch_optional(
        db,
        &format!("SELECT {COLUMNS} FROM inventories WHERE id = $1 AND deleted_at IS NULL"),
        &[&id],
    )
}

/// Inventories the user owns or actively belongs to, newest first
pub fn list_for_user(db: &dyn DbExecutor, user_id: Uuid, page: Page) -> Result<Vec<Inventory>, DbError> {
    fetch_all(
        db,
        "SELECT i.id, i.name, i.owner_user_id, i.created_at
         FROM inventories i
         WHERE i.deleted_at IS NULL
           AND (i.owner_user_id = $1
                OR EXISTS (SELECT 1 FROM inventory_memberships m
                           WHERE m.inventory_id = i.id AND m.user_id = $1 AND m.removed_at IS NULL))
         ORDER BY i.created_at DESC
         LIMIT $2 OFFSET $3",
        &[&user_id, &page.limit, &page.offset],
    )
}
