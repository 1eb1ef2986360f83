//! Products as the household knows them: generic canonical products, concrete
//! products and their purchasable variants, plus the global seller/outlet
//! directory.

use serde_json::json;
use uuid::Uuid;

use crate::error::PantryError;
use crate::executor::DbExecutor;
use crate::models::catalog;
use crate::models::{
    ActivityEntry, CanonicalProduct, NewCanonicalProduct, NewOutlet, NewProduct, NewVariant, Outlet,
    Product, ProductVariant, Seller,
};
use crate::pool::config::ListingConfig;
use crate::services::activity::ActivityLog;
use crate::services::membership::Authorizer;
use crate::services::{enter, required, PageRequest};

#[derive(Debug, Clone, Default)]
pub struct CatalogService {
    authz: Authorizer,
    activity: ActivityLog,
    listing: ListingConfig,
}

impl CatalogService {
    pub fn new(listing: ListingConfig) -> Self {
        Self {
            authz: Authorizer,
            activity: ActivityLog,
            listing,
        }
    }

    pub fn create_canonical_product(
        &self,
        db: &dyn DbExecutor,
        actor: Uuid,
        inventory_id: Uuid,
        input: &NewCanonicalProduct,
    ) -> Result<CanonicalProduct, PantryError> {
        let input = NewCanonicalProduct {
            name: required("name", &input.name)?.to_string(),
            ..input.clone()
        };
        let _span = enter("catalog.create_canonical_product");

        let tx = db.begin()?;
        self.authz.require_member(&tx, actor, inventory_id)?;
        let created = catalog::insert_canonical(&tx, inventory_id, &input)?;
        self.activity.record(
            &tx,
            &ActivityEntry::new("canonical_product.created", "canonical_product", created.id)
                .in_inventory(inventory_id)
                .by(actor)
                .with_metadata(json!({ "name": created.name })),
        )?;
        tx.commit()?;
        Ok(created)
    }

    pub fn get_canonical_product(
        &self,
        db: &dyn DbExecutor,
        actor: Uuid,
        id: Uuid,
    ) -> Result<CanonicalProduct, PantryError> {
        let found = catalog::find_canonical(db, id)?.ok_or_else(|| PantryError::not_found("canonical product"))?;
        self.authz
            .require_visible(db, actor, found.inventory_id, "canonical product")?;
        Ok(found)
    }

    /// Alphabetical; `search` matches anywhere in the name, ignoring case.
    pub fn list_canonical_products(
        &self,
        db: &dyn DbExecutor,
        actor: Uuid,
        inventory_id: Uuid,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Vec<CanonicalProduct>, PantryError> {
        self.authz.require_member(db, actor, inventory_id)?;
        let page = self.listing.page(page.limit, page.offset);
        Ok(catalog::list_canonical(db, inventory_id, non_blank(search), page)?)
    }

    /// Replace name, description and category. Canonical products in
    /// inventories the actor cannot see are reported as missing.
    pub fn update_canonical_product(
        &self,
        db: &dyn DbExecutor,
        actor: Uuid,
        id: Uuid,
        input: &NewCanonicalProduct,
    ) -> Result<CanonicalProduct, PantryError> {
        let input = NewCanonicalProduct {
            name: required("name", &input.name)?.to_string(),
            ..input.clone()
        };
        let _span = enter("catalog.update_canonical_product");

        let tx = db.begin()?;
        let current = self.get_canonical_product(&tx, actor, id)?;
        let updated = catalog::update_canonical(&tx, current.id, &input)?
            .ok_or_else(|| PantryError::not_found("canonical product"))?;
        self.activity.record(
            &tx,
            &ActivityEntry::new("canonical_product.updated", "canonical_product", updated.id)
                .in_inventory(updated.inventory_id)
                .by(actor)
                .with_metadata(json!({ "name": updated.name })),
        )?;
        tx.commit()?;
        Ok(updated)
    }

    /// Soft delete. Products linked to it keep their reference.
    pub fn delete_canonical_product(&self, db: &dyn DbExecutor, actor: Uuid, id: Uuid) -> Result<(), PantryError> {
        let _span = enter("catalog.delete_canonical_product");
        let tx = db.begin()?;
        let current = self.get_canonical_product(&tx, actor, id)?;
        if !catalog::soft_delete_canonical(&tx, current.id)? {
            return Err(PantryError::not_found("canonical product"));
        }
        self.activity.record(
            &tx,
            &ActivityEntry::new("canonical_product.deleted", "canonical_product", current.id)
                .in_inventory(current.inventory_id)
                .by(actor)
                .with_metadata(json!({ "name": current.name })),
        )?;
        tx.commit()?;
        Ok(())
    }

    /// A linked canonical product must belong to the same inventory.
    pub fn create_product(
        &self,
        db: &dyn DbExecutor,
        actor: Uuid,
        inventory_id: Uuid,
        input: &NewProduct,
    ) -> Result<Product, PantryError> {
        let input = NewProduct {
            name: required("name", &input.name)?.to_string(),
            ..input.clone()
        };
        let _span = enter("catalog.create_product");

        let tx = db.begin()?;
        self.authz.require_member(&tx, actor, inventory_id)?;
        if let Some(canonical_id) = input.canonical_product_id {
            if !catalog::canonical_in_inventory(&tx, canonical_id, inventory_id)? {
                return Err(PantryError::not_found("canonical product"));
            }
        }
        let created = catalog::insert_product(&tx, inventory_id, &input)?;
        self.activity.record(
            &tx,
            &ActivityEntry::new("product.created", "product", created.id)
                .in_inventory(inventory_id)
                .by(actor)
                .with_metadata(json!({ "name": created.name, "brand": created.brand })),
        )?;
        tx.commit()?;
        Ok(created)
    }

    pub fn get_product(&self, db: &dyn DbExecutor, actor: Uuid, id: Uuid) -> Result<Product, PantryError> {
        let found = catalog::find_product(db, id)?.ok_or_else(|| PantryError::not_found("product"))?;
        self.authz.require_visible(db, actor, found.inventory_id, "product")?;
        Ok(found)
    }

    /// Replace every editable field of a product, including its canonical link.
    pub fn update_product(
        &self,
        db: &dyn DbExecutor,
        actor: Uuid,
        id: Uuid,
        input: &NewProduct,
    ) -> Result<Product, PantryError> {
        let input = NewProduct {
            name: required("name", &input.name)?.to_string(),
            ..input.clone()
        };
        let _span = enter("catalog.update_product");

        let tx = db.begin()?;
        let current = self.get_product(&tx, actor, id)?;
        if let Some(canonical_id) = input.canonical_product_id {
            if !catalog::canonical_in_inventory(&tx, canonical_id, current.inventory_id)? {
                return Err(PantryError::not_found("canonical product"));
            }
        }
        let updated =
            catalog::update_product(&tx, current.id, &input)?.ok_or_else(|| PantryError::not_found("product"))?;
        self.activity.record(
            &tx,
            &ActivityEntry::new("product.updated", "product", updated.id)
                .in_inventory(updated.inventory_id)
                .by(actor)
                .with_metadata(json!({ "name": updated.name, "brand": updated.brand })),
        )?;
        tx.commit()?;
        Ok(updated)
    }

    /// Soft delete. The product's variants can no longer be bought; stock
    /// already recorded for them is kept.
    pub fn delete_product(&self, db: &dyn DbExecutor, actor: Uuid, id: Uuid) -> Result<(), PantryError> {
        let _span = enter("catalog.delete_product");
        let tx = db.begin()?;
        let current = self.get_product(&tx, actor, id)?;
        if !catalog::soft_delete_product(&tx, current.id)? {
            return Err(PantryError::not_found("product"));
        }
        self.activity.record(
            &tx,
            &ActivityEntry::new("product.deleted", "product", current.id)
                .in_inventory(current.inventory_id)
                .by(actor)
                .with_metadata(json!({ "name": current.name })),
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Alphabetical; `search` matches the name or the brand.
    pub fn list_products(
        &self,
        db: &dyn DbExecutor,
        actor: Uuid,
        inventory_id: Uuid,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Vec<Product>, PantryError> {
        self.authz.require_member(db, actor, inventory_id)?;
        let page = self.listing.page(page.limit, page.offset);
        Ok(catalog::list_products(db, inventory_id, non_blank(search), page)?)
    }

    /// Add a purchasable form of a product. `size` must be positive when given.
    pub fn create_variant(
        &self,
        db: &dyn DbExecutor,
        actor: Uuid,
        product_id: Uuid,
        input: &NewVariant,
    ) -> Result<ProductVariant, PantryError> {
        let input = NewVariant {
            variant_name: required("variant name", &input.variant_name)?.to_string(),
            ..input.clone()
        };
        if let Some(size) = input.size {
            if !size.is_finite() || size <= 0.0 {
                return Err(PantryError::invalid("variant size must be a positive number"));
            }
        }
        let _span = enter("catalog.create_variant");

        let tx = db.begin()?;
        let product = self.get_product(&tx, actor, product_id)?;
        let created = catalog::insert_variant(&tx, product.id, &input)?;
        self.activity.record(
            &tx,
            &ActivityEntry::new("variant.created", "product_variant", created.id)
                .in_inventory(product.inventory_id)
                .by(actor)
                .with_metadata(json!({
                    "product_id": product.id,
                    "variant_name": created.variant_name,
                    "size": created.size,
                    "unit": created.unit,
                })),
        )?;
        tx.commit()?;
        Ok(created)
    }

    pub fn list_variants(
        &self,
        db: &dyn DbExecutor,
        actor: Uuid,
        product_id: Uuid,
    ) -> Result<Vec<ProductVariant>, PantryError> {
        let product = self.get_product(db, actor, product_id)?;
        Ok(catalog::list_variants(db, product.id)?)
    }

    pub fn get_variant(&self, db: &dyn DbExecutor, actor: Uuid, id: Uuid) -> Result<ProductVariant, PantryError> {
        let (variant, inventory_id) =
            catalog::find_variant_with_inventory(db, id)?.ok_or_else(|| PantryError::not_found("product variant"))?;
        self.authz
            .require_visible(db, actor, inventory_id, "product variant")?;
        Ok(variant)
    }

    pub fn create_seller(&self, db: &dyn DbExecutor, name: &str) -> Result<Seller, PantryError> {
        Ok(catalog::insert_seller(db, required("seller name", name)?)?)
    }

    pub fn create_outlet(&self, db: &dyn DbExecutor, seller_id: Uuid, input: &NewOutlet) -> Result<Outlet, PantryError> {
        let input = NewOutlet {
            name: required("outlet name", &input.name)?.to_string(),
            ..input.clone()
        };
        catalog::insert_outlet(db, seller_id, &input).map_err(|e| {
            if e.is_foreign_key_violation() {
                PantryError::not_found("seller")
            } else {
                e.into()
            }
        })
    }

    pub fn get_outlet(&self, db: &dyn DbExecutor, id: Uuid) -> Result<Outlet, PantryError> {
        catalog::find_outlet(db, id)?.ok_or_else(|| PantryError::not_found("outlet"))
    }
}

fn non_blank(search: Option<&str>) -> Option<&str> {
    search.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_search_means_no_filter() {
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some("  ")), None);
        assert_eq!(non_blank(Some(" milk ")), Some("milk"));
    }
}
