use chrono::{DateTime, Utc};
use may_postgres::Row;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::executor::{DbError, DbExecutor};
use crate::pool::config::Page;
use crate::raw_sql::{column, fetch_all, fetch_one, FromRow};

/// An audit entry to append
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEntry {
    pub inventory_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    /// Dotted verb, e.g. `transaction.created`
    pub action: &'static str,
    pub entity_type: &'static str,
    pub entity_id: Option<Uuid>,
    pub metadata: Option<Value>,
}

impl ActivityEntry {
    pub fn new(action: &'static str, entity_type: &'static str, entity_id: Uuid) -> Self {
        Self {
            inventory_id: None,
            user_id: None,
            action,
            entity_type,
            entity_id: Some(entity_id),
            metadata: None,
        }
    }

    pub fn in_inventory(mut self, inventory_id: Uuid) -> Self {
        self.inventory_id = Some(inventory_id);
        self
    }

    pub fn by(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A stored audit entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityRecord {
    pub id: Uuid,
    pub inventory_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl FromRow for ActivityRecord {
    fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: column(row, "id")?,
            inventory_id: column(row, "inventory_id")?,
            user_id: column(row, "user_id")?,
            action: column(row, "action")?,
            entity_type: column(row, "entity_type")?,
            entity_id: column(row, "entity_id")?,
            metadata: column(row, "metadata")?,
            created_at: column(row, "created_at")?,
        })
    }
}

const COLUMNS: &str = "id, inventory_id, user_id, action, entity_type, entity_id, metadata, created_at";

pub fn insert(db: &dyn DbExecutor, entry: &ActivityEntry) -> Result<ActivityRecord, DbError> {
    fetch_one(
        db,
        &format!(
            "INSERT INTO activity_logs (inventory_id, user_id, action, entity_type, entity_id, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {COLUMNS}"
        ),
        &[
            &entry.inventory_id,
            &entry.user_id,
            &entry.action,
            &entry.entity_type,
            &entry.entity_id,
            &entry.metadata,
        ],
    )
}

/// Newest first
pub fn list_for_inventory(
    db: &dyn DbExecutor,
    inventory_id: Uuid,
    page: Page,
) -> Result<Vec<ActivityRecord>, DbError> {
    fetch_all(
        db,
        &format!(
            "SELECT {COLUMNS} FROM activity_logs WHERE inventory_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ),
        &[&inventory_id, &page.limit, &page.offset],
    )
}
