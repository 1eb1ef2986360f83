//! Purchase recording.
//!
//! A purchase is a header, its items, the resulting stock changes and one
//! audit entry, written in a single scope: either all of it lands or none.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use crate::error::PantryError;
use crate::executor::DbExecutor;
use crate::models::{catalog, shopping_list, transaction};
use crate::models::{ActivityEntry, NewTransactionItem, Transaction, TransactionWithItems};
use crate::pool::config::ListingConfig;
use crate::services::activity::ActivityLog;
use crate::services::membership::Authorizer;
use crate::services::stock::{StockEngine, StockLine};
use crate::services::{enter, PageRequest};

const TOTAL_SCALE: u32 = 4;

#[derive(Debug, Clone)]
pub struct CreateTransactionInput {
    pub inventory_id: Uuid,
    pub outlet_id: Option<Uuid>,
    /// Defaults to now
    pub transaction_date: Option<DateTime<Utc>>,
    pub items: Vec<NewTransactionItem>,
}

impl CreateTransactionInput {
    pub fn new(inventory_id: Uuid, items: Vec<NewTransactionItem>) -> Self {
        Self {
            inventory_id,
            outlet_id: None,
            transaction_date: None,
            items,
        }
    }
}

/// Reject inputs that could never be recorded, before any query runs.
pub(crate) fn validate(items: &[NewTransactionItem]) -> Result<(), PantryError> {
    if items.is_empty() {
        return Err(PantryError::invalid("a transaction needs at least one item"));
    }
    for (index, item) in items.iter().enumerate() {
        if !item.quantity.is_finite() || item.quantity <= 0.0 {
            return Err(PantryError::invalid(format!(
                "item {index}: quantity must be a positive number"
            )));
        }
        if item.price_per_unit.is_some_and(|price| price < Decimal::ZERO) {
            return Err(PantryError::invalid(format!(
                "item {index}: price per unit must not be negative"
            )));
        }
    }
    Ok(())
}

/// Sum of `quantity x price_per_unit`, rounded to 4 places. Unpriced items add nothing.
pub fn compute_total(items: &[NewTransactionItem]) -> Result<Decimal, PantryError> {
    let mut total = Decimal::ZERO;
    for item in items {
        let Some(price) = item.price_per_unit else {
            continue;
        };
        let quantity = Decimal::from_f64(item.quantity)
            .ok_or_else(|| PantryError::invalid("quantity is not representable as a decimal"))?;
        total = quantity
            .checked_mul(price)
            .and_then(|line| total.checked_add(line))
            .ok_or_else(|| PantryError::invalid("transaction total is out of range"))?;
    }
    Ok(total.round_dp(TOTAL_SCALE))
}

#[derive(Debug, Clone, Default)]
pub struct TransactionService {
    authz: Authorizer,
    activity: ActivityLog,
    stock: StockEngine,
    listing: ListingConfig,
}

impl TransactionService {
    pub fn new(listing: ListingConfig) -> Self {
        Self {
            authz: Authorizer,
            activity: ActivityLog,
            stock: StockEngine::new(listing),
            listing,
        }
    }

    /// Record a purchase and add its items to stock.
    pub fn create_transaction(
        &self,
        db: &dyn DbExecutor,
        actor: Uuid,
        input: &CreateTransactionInput,
    ) -> Result<Transaction, PantryError> {
        validate(&input.items)?;
        let total = compute_total(&input.items)?;
        let inventory_id = input.inventory_id;
        let _span = enter("transactions.create");

        let tx = db.begin()?;
        self.authz.require_member(&tx, actor, inventory_id)?;
        if let Some(outlet_id) = input.outlet_id {
            if catalog::find_outlet(&tx, outlet_id)?.is_none() {
                return Err(PantryError::not_found("outlet"));
            }
        }
        for item in &input.items {
            if let Some(list_item) = item.shopping_list_item_id {
                if !shopping_list::item_in_inventory(&tx, list_item, inventory_id)? {
                    return Err(PantryError::not_found("shopping list item"));
                }
            }
        }

        let header = transaction::insert_header(
            &tx,
            inventory_id,
            input.outlet_id,
            actor,
            input.transaction_date,
            total,
        )?;
        transaction::insert_items(&tx, header.id, &input.items).map_err(|e| {
            if e.is_foreign_key_violation() {
                PantryError::not_found("product variant")
            } else {
                e.into()
            }
        })?;
        let lines: Vec<StockLine> = input.items.iter().map(StockLine::from).collect();
        self.stock.apply_transaction_items(&tx, inventory_id, &lines)?;
        self.activity.record(
            &tx,
            &ActivityEntry::new("transaction.created", "transaction", header.id)
                .in_inventory(inventory_id)
                .by(actor)
                .with_metadata(json!({
                    "item_count": input.items.len(),
                    "total_amount": total.to_f64(),
                })),
        )?;
        tx.commit()?;

        log::info!(
            "transaction {} recorded in inventory {inventory_id} ({} items, total {total})",
            header.id,
            input.items.len()
        );
        Ok(header)
    }

    /// A purchase with its items. Purchases in inventories the actor cannot
    /// see are reported as missing.
    pub fn get_transaction(
        &self,
        db: &dyn DbExecutor,
        actor: Uuid,
        transaction_id: Uuid,
    ) -> Result<TransactionWithItems, PantryError> {
        let header = transaction::find(db, transaction_id)?.ok_or_else(|| PantryError::not_found("transaction"))?;
        self.authz
            .require_visible(db, actor, header.inventory_id, "transaction")?;
        let items = transaction::items_for(db, header.id)?;
        Ok(TransactionWithItems {
            transaction: header,
            items,
        })
    }

    /// Most recent purchase first.
    pub fn list_transactions(
        &self,
        db: &dyn DbExecutor,
        actor: Uuid,
        inventory_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<Transaction>, PantryError> {
        self.authz.require_member(db, actor, inventory_id)?;
        let page = self.listing.page(page.limit, page.offset);
        Ok(transaction::list_for_inventory(db, inventory_id, page)?)
    }
}
