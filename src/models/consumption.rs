use chrono::{DateTime, Utc};
use may_postgres::Row;
use serde::Serialize;
use uuid::Uuid;

use crate::executor::{DbError, DbExecutor};
use crate::pool::config::Page;
use crate::raw_sql::{column, fetch_all, fetch_one, FromRow};

/// Something was used up. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumptionEvent {
    pub id: Uuid,
    pub inventory_id: Uuid,
    pub canonical_product_id: Option<Uuid>,
    pub created_by_user_id: Uuid,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub note: Option<String>,
    pub source: String,
    pub consumed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl FromRow for ConsumptionEvent {
    fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: column(row, "id")?,
            inventory_id: column(row, "inventory_id")?,
            canonical_product_id: column(row, "canonical_product_id")?,
            created_by_user_id: column(row, "created_by_user_id")?,
            quantity: column(row, "quantity")?,
            unit: column(row, "unit")?,
            note: column(row, "note")?,
            source: column(row, "source")?,
            consumed_at: column(row, "consumed_at")?,
            created_at: column(row, "created_at")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewConsumption {
    pub inventory_id: Uuid,
    pub canonical_product_id: Option<Uuid>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub note: Option<String>,
    /// Defaults to `"manual"`
    pub source: Option<String>,
    /// Defaults to now
    pub consumed_at: Option<DateTime<Utc>>,
}

pub const DEFAULT_SOURCE: &str = "manual";

const COLUMNS: &str = "id, inventory_id, canonical_product_id, created_by_user_id, quantity, unit, note, \
                       source, consumed_at, created_at";

pub fn insert(
    db: &dyn DbExecutor,
    created_by: Uuid,
    input: &NewConsumption,
    source: &str,
) -> Result<ConsumptionEvent, DbError> {
    fetch_one(
        db,
        &format!(
            "INSERT INTO consumption_events \
             (inventory_id, canonical_product_id, created_by_user_id, quantity, unit, note, source, consumed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, now())) RETURNING {COLUMNS}"
        ),
        &[
            &input.inventory_id,
            &input.canonical_product_id,
            &created_by,
            &input.quantity,
            &input.unit,
            &input.note,
            &source,
            &input.consumed_at,
        ],
    )
}

/// Most recent consumption first
pub fn list_for_inventory(
    db: &dyn DbExecutor,
    inventory_id: Uuid,
    page: Page,
) -> Result<Vec<ConsumptionEvent>, DbError> {
    fetch_all(
        db,
        &format!(
            "SELECT {COLUMNS} FROM consumption_events WHERE inventory_id = $1 \
             ORDER BY consumed_at DESC, id ASC LIMIT $2 OFFSET $3"
        ),
        &[&inventory_id, &page.limit, &page.offset],
    )
}
