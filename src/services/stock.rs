//! Running stock per (inventory, variant).
//!
//! Stock only grows here: each purchased line adds `quantity x package size`
//! to its row in one upsert statement, so concurrent purchases of the same
//! variant all land and their order does not matter.

use uuid::Uuid;

use crate::error::PantryError;
use crate::executor::DbExecutor;
use crate::models::{catalog, stock};
use crate::models::{NewTransactionItem, StockRow};
use crate::pool::config::ListingConfig;
use crate::services::membership::Authorizer;
use crate::services::PageRequest;

/// One purchased line as far as stock is concerned
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StockLine {
    pub product_variant_id: Uuid,
    pub quantity: f64,
}

impl From<&NewTransactionItem> for StockLine {
    fn from(item: &NewTransactionItem) -> Self {
        Self {
            product_variant_id: item.product_variant_id,
            quantity: item.quantity,
        }
    }
}

/// Units of stock gained by buying `quantity` packages of `size` each.
/// Variants without a size count one unit per package.
pub fn stock_delta(quantity: f64, size: Option<f64>) -> f64 {
    quantity * size.unwrap_or(1.0)
}

#[derive(Debug, Clone, Default)]
pub struct StockEngine {
    authz: Authorizer,
    listing: ListingConfig,
}

impl StockEngine {
    pub fn new(listing: ListingConfig) -> Self {
        Self {
            authz: Authorizer,
            listing,
        }
    }

    /// Add every line to the inventory's stock, all or nothing.
    ///
    /// A variant that does not exist, was deleted, or belongs to another
    /// inventory fails the whole call with `NotFound`.
    pub fn apply_transaction_items(
        &self,
        db: &dyn DbExecutor,
        inventory_id: Uuid,
        items: &[StockLine],
    ) -> Result<Vec<StockRow>, PantryError> {
        let tx = db.begin()?;
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let variant = catalog::find_variant_with_inventory(&tx, item.product_variant_id)?
                .filter(|(_, owner)| *owner == inventory_id)
                .map(|(variant, _)| variant)
                .ok_or_else(|| {
                    PantryError::NotFound(format!("product variant {} not found", item.product_variant_id))
                })?;
            let delta = stock_delta(item.quantity, variant.size);
            rows.push(stock::accumulate(
                &tx,
                inventory_id,
                variant.id,
                delta,
                variant.unit.as_deref(),
            )?);
        }
        tx.commit()?;
        Ok(rows)
    }

    /// Stock rows, most recently changed first.
    pub fn list_stock(
        &self,
        db: &dyn DbExecutor,
        actor: Uuid,
        inventory_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<StockRow>, PantryError> {
        self.authz.require_member(db, actor, inventory_id)?;
        let page = self.listing.page(page.limit, page.offset);
        Ok(stock::list(db, inventory_id, page)?)
    }

    /// `None` if the variant was never bought into this inventory.
    pub fn stock_level(
        &self,
        db: &dyn DbExecutor,
        actor: Uuid,
        inventory_id: Uuid,
        product_variant_id: Uuid,
    ) -> Result<Option<StockRow>, PantryError> {
        self.authz.require_member(db, actor, inventory_id)?;
        Ok(stock::find(db, inventory_id, product_variant_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_scales_by_package_size() {
        assert_eq!(stock_delta(2.0, Some(1.5)), 3.0);
        assert_eq!(stock_delta(1.0, Some(1.5)), 1.5);
    }

    #[test]
    fn test_unsized_variant_counts_packages() {
        assert_eq!(stock_delta(3.0, None), 3.0);
    }

    #[test]
    fn test_line_from_transaction_item() {
        let variant = Uuid::new_v4();
        let line = StockLine::from(&NewTransactionItem::new(variant, 4.0));
        assert_eq!(line.product_variant_id, variant);
        assert_eq!(line.quantity, 4.0);
    }
}
