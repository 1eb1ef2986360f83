use chrono::{DateTime, Utc};
use may_postgres::types::ToSql;
use may_postgres::Row;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt::Write;
use uuid::Uuid;

use crate::executor::{DbError, DbExecutor};
use crate::pool::config::Page;
use crate::raw_sql::{column, fetch_all, fetch_one, fetch_optional, FromRow};

/// A purchase event header
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: Uuid,
    pub inventory_id: Uuid,
    pub outlet_id: Option<Uuid>,
    pub created_by_user_id: Uuid,
    pub transaction_date: DateTime<Utc>,
    /// Sum of quantity x unit price over the items, fixed at creation
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl FromRow for Transaction {
    fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: column(row, "id")?,
            inventory_id: column(row, "inventory_id")?,
            outlet_id: column(row, "outlet_id")?,
            created_by_user_id: column(row, "created_by_user_id")?,
            transaction_date: column(row, "transaction_date")?,
            total_amount: column(row, "total_amount")?,
            created_at: column(row, "created_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionItem {
    pub id: Uuid,
    pub transaction_id: Uuid,
    /// Position in the submitted item list, from 0
    pub line_no: i32,
    pub product_variant_id: Uuid,
    pub quantity: f64,
    pub price_per_unit: Option<Decimal>,
    pub shopping_list_item_id: Option<Uuid>,
}

impl FromRow for TransactionItem {
    fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: column(row, "id")?,
            transaction_id: column(row, "transaction_id")?,
            line_no: column(row, "line_no")?,
            product_variant_id: column(row, "product_variant_id")?,
            quantity: column(row, "quantity")?,
            price_per_unit: column(row, "price_per_unit")?,
            shopping_list_item_id: column(row, "shopping_list_item_id")?,
        })
    }
}

/// One purchased line as submitted by the caller
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransactionItem {
    pub product_variant_id: Uuid,
    pub quantity: f64,
    pub price_per_unit: Option<Decimal>,
    pub shopping_list_item_id: Option<Uuid>,
}

impl NewTransactionItem {
    pub fn new(product_variant_id: Uuid, quantity: f64) -> Self {
        Self {
            product_variant_id,
            quantity,
            price_per_unit: None,
            shopping_list_item_id: None,
        }
    }

    pub fn priced(mut self, price_per_unit: Decimal) -> Self {
        self.price_per_unit = Some(price_per_unit);
        self
    }

    pub fn for_list_item(mut self, shopping_list_item_id: Uuid) -> Self {
        self.shopping_list_item_id = Some(shopping_list_item_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionWithItems {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub items: Vec<TransactionItem>,
}

const COLUMNS: &str =
    "id, inventory_id, outlet_id, created_by_user_id, transaction_date, total_amount, created_at";
const ITEM_COLUMNS: &str =
    "id, transaction_id, line_no, product_variant_id, quantity, price_per_unit, shopping_list_item_id";

/// Insert the header; the date defaults to the server's clock
pub fn insert_header(
    db: &dyn DbExecutor,
    inventory_id: Uuid,
    outlet_id: Option<Uuid>,
    created_by: Uuid,
    transaction_date: Option<DateTime<Utc>>,
    total_amount: Decimal,
) -> Result<Transaction, DbError> {
    fetch_one(
        db,
        &format!(
            "INSERT INTO transactions (inventory_id, outlet_id, created_by_user_id, transaction_date, total_amount) \
             VALUES ($1, $2, $3, COALESCE($4, now()), $5) RETURNING {COLUMNS}"
        ),
        &[&inventory_id, &outlet_id, &created_by, &transaction_date, &total_amount],
    )
}

/// Multi-row `INSERT ... VALUES (...), (...)` for all items at once.
/// Line numbers are the item positions, written as literals.
pub(crate) fn bulk_insert_sql(item_count: usize) -> String {
    let mut sql = String::from(
        "INSERT INTO transaction_items \
         (transaction_id, line_no, product_variant_id, quantity, price_per_unit, shopping_list_item_id) VALUES ",
    );
    for i in 0..item_count {
        let base = 2 + i * 4;
        if i > 0 {
            sql.push_str(", ");
        }
        let _ = write!(sql, "($1, {i}, ${}, ${}, ${}, ${})", base, base + 1, base + 2, base + 3);
    }
    let _ = write!(sql, " RETURNING {ITEM_COLUMNS}");
    sql
}

pub fn insert_items(
    db: &dyn DbExecutor,
    transaction_id: Uuid,
    items: &[NewTransactionItem],
) -> Result<Vec<TransactionItem>, DbError> {
    if items.is_empty() {
        return Ok(Vec::new());
    }
    let mut params: Vec<&dyn ToSql> = Vec::with_capacity(1 + items.len() * 4);
    params.push(&transaction_id);
    for item in items {
        params.push(&item.product_variant_id);
        params.push(&item.quantity);
        params.push(&item.price_per_unit);
        params.push(&item.shopping_list_item_id);
    }
    fetch_all(db, &bulk_insert_sql(items.len()), &params)
}

pub fn find(db: &dyn DbExecutor, id: Uuid) -> Result<Option<Transaction>, DbError> {
    fetch_optional(db, &format!("SELECT {COLUMNS} FROM transactions WHERE id = $1"), &[&id])
}

pub fn items_for(db: &dyn DbExecutor, transaction_id: Uuid) -> Result<Vec<TransactionItem>, DbError> {
    fetch_all(
        db,
        &format!(
            "SELECT {ITEM_COLUMNS} FROM transaction_items WHERE transaction_id = $1 \
             ORDER BY line_no ASC"
        ),
        &[&transaction_id],
    )
}

/// Most recent purchase first
pub fn list_for_inventory(
    db: &dyn DbExecutor,
    inventory_id: Uuid,
    page: Page,
) -> Result<Vec<Transaction>, DbError> {
    fetch_all(
        db,
        &format!(
            "SELECT {COLUMNS} FROM transactions WHERE inventory_id = $1 \
             ORDER BY transaction_date DESC, created_at DESC, id ASC LIMIT $2 OFFSET $3"
        ),
        &[&inventory_id, &page.limit, &page.offset],
    )
}
