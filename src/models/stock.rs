use chrono::{DateTime, Utc};
use may_postgres::Row;
use serde::Serialize;
use uuid::Uuid;

use crate::executor::{DbError, DbExecutor};
use crate::pool::config::Page;
use crate::raw_sql::{column, fetch_all, fetch_one, fetch_optional, FromRow};

/// Running quantity of one variant held by one inventory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockRow {
    pub id: Uuid,
    pub inventory_id: Uuid,
    pub product_variant_id: Uuid,
    pub quantity: f64,
    pub unit: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl FromRow for StockRow {
    fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: column(row, "id")?,
            inventory_id: column(row, "inventory_id")?,
            product_variant_id: column(row, "product_variant_id")?,
            quantity: column(row, "quantity")?,
            unit: column(row, "unit")?,
            created_at: column(row, "created_at")?,
            last_updated: column(row, "last_updated")?,
        })
    }
}

const COLUMNS: &str = "id, inventory_id, product_variant_id, quantity, unit, created_at, last_updated";

/// Add `delta` to the stock row, creating it at `delta` if absent.
///
/// One statement, so concurrent callers on the same (inventory, variant) each
/// land their delta. The first non-null unit written sticks.
pub fn accumulate(
    db: &dyn DbExecutor,
    inventory_id: Uuid,
    product_variant_id: Uuid,
    delta: f64,
    unit: Option<&str>,
) -> Result<StockRow, DbError> {
    fetch_one(
        db,
        &format!(
            "INSERT INTO inventory_products (inventory_id, product_variant_id, quantity, unit) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (inventory_id, product_variant_id) DO UPDATE SET \
               quantity = inventory_products.quantity + EXCLUDED.quantity, \
               unit = COALESCE(inventory_products.unit, EXCLUDED.unit), \
               last_updated = now() \
             RETURNING {COLUMNS}"
        ),
        &[&inventory_id, &product_variant_id, &delta, &unit],
    )
}

pub fn find(
    db: &dyn DbExecutor,
    inventory_id: Uuid,
    product_variant_id: Uuid,
) -> Result<Option<StockRow>, DbError> {
    fetch_optional(
        db,
        &format!(
            "SELECT {COLUMNS} FROM inventory_products \
             WHERE inventory_id = $1 AND product_variant_id = $2"
        ),
        &[&inventory_id, &product_variant_id],
    )
}

/// Most recently changed first
pub fn list(db: &dyn DbExecutor, inventory_id: Uuid, page: Page) -> Result<Vec<StockRow>, DbError> {
    fetch_all(
        db,
        &format!(
            "SELECT {COLUMNS} FROM inventory_products WHERE inventory_id = $1 \
             ORDER BY last_updated DESC, id ASC LIMIT $2 OFFSET $3"
        ),
        &[&inventory_id, &page.limit, &page.offset],
    )
}
