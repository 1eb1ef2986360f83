//! Shopping lists and their items.
//!
//! Lists belonging to inventories the actor cannot see are reported as
//! missing; every change is audited in the scope that makes it.

use serde_json::json;
use uuid::Uuid;

use crate::error::PantryError;
use crate::executor::DbExecutor;
use crate::models::{catalog, shopping_list};
use crate::models::{ActivityEntry, ItemTarget, NewShoppingListItem, ShoppingList, ShoppingListItem};
use crate::pool::config::ListingConfig;
use crate::services::activity::ActivityLog;
use crate::services::membership::Authorizer;
use crate::services::{enter, required, PageRequest};

/// Item fields to change. A `None` field is left as it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateShoppingListItem {
    pub notes: Option<String>,
    pub preferred_outlet_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct ShoppingListService {
    authz: Authorizer,
    activity: ActivityLog,
    listing: ListingConfig,
}

impl ShoppingListService {
    pub fn new(listing: ListingConfig) -> Self {
        Self {
            authz: Authorizer,
            activity: ActivityLog,
            listing,
        }
    }

    pub fn create_list(
        &self,
        db: &dyn DbExecutor,
        actor: Uuid,
        inventory_id: Uuid,
        name: &str,
    ) -> Result<ShoppingList, PantryError> {
        let name = required("list name", name)?;
        let _span = enter("shopping_list.create");

        let tx = db.begin()?;
        self.authz.require_member(&tx, actor, inventory_id)?;
        let list = shopping_list::insert(&tx, inventory_id, name, actor)?;
        self.audit(&tx, "shopping_list.created", "shopping_list", list.id, &list, actor, json!({ "name": list.name }))?;
        tx.commit()?;
        Ok(list)
    }

    /// Live lists, most recently touched first.
    pub fn list_lists(
        &self,
        db: &dyn DbExecutor,
        actor: Uuid,
        inventory_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<ShoppingList>, PantryError> {
        self.authz.require_visible(db, actor, inventory_id, "inventory")?;
        let page = self.listing.page(page.limit, page.offset);
        Ok(shopping_list::list_for_inventory(db, inventory_id, page)?)
    }

    pub fn get_list(&self, db: &dyn DbExecutor, actor: Uuid, list_id: Uuid) -> Result<ShoppingList, PantryError> {
        let list = shopping_list::find_live(db, list_id)?.ok_or_else(|| PantryError::not_found("shopping list"))?;
        self.authz
            .require_visible(db, actor, list.inventory_id, "shopping list")?;
        Ok(list)
    }

    pub fn rename_list(
        &self,
        db: &dyn DbExecutor,
        actor: Uuid,
        list_id: Uuid,
        name: &str,
    ) -> Result<ShoppingList, PantryError> {
        let name = required("list name", name)?;

        let tx = db.begin()?;
        let list = self.get_list(&tx, actor, list_id)?;
        let renamed =
            shopping_list::rename(&tx, list.id, name)?.ok_or_else(|| PantryError::not_found("shopping list"))?;
        self.audit(
            &tx,
            "shopping_list.updated",
            "shopping_list",
            list.id,
            &list,
            actor,
            json!({ "old_name": list.name, "name": renamed.name }),
        )?;
        tx.commit()?;
        Ok(renamed)
    }

    /// Soft delete; the list disappears from reads but its history stays.
    pub fn delete_list(&self, db: &dyn DbExecutor, actor: Uuid, list_id: Uuid) -> Result<(), PantryError> {
        let tx = db.begin()?;
        let list = self.get_list(&tx, actor, list_id)?;
        if !shopping_list::soft_delete(&tx, list.id)? {
            return Err(PantryError::not_found("shopping list"));
        }
        self.audit(&tx, "shopping_list.deleted", "shopping_list", list.id, &list, actor, json!({ "name": list.name }))?;
        tx.commit()?;
        Ok(())
    }

    /// The target must be a canonical product or variant of the list's inventory.
    pub fn add_item(
        &self,
        db: &dyn DbExecutor,
        actor: Uuid,
        list_id: Uuid,
        input: &NewShoppingListItem,
    ) -> Result<ShoppingListItem, PantryError> {
        let _span = enter("shopping_list.add_item");

        let tx = db.begin()?;
        let list = self.get_list(&tx, actor, list_id)?;
        self.check_target(&tx, list.inventory_id, input.target)?;
        self.check_outlet(&tx, input.preferred_outlet_id)?;
        let item = shopping_list::insert_item(&tx, list.id, input)?;
        shopping_list::touch(&tx, list.id)?;
        self.audit(
            &tx,
            "shopping_list_item.created",
            "shopping_list_item",
            item.id,
            &list,
            actor,
            json!({ "shopping_list_id": list.id, "target": item.target }),
        )?;
        tx.commit()?;
        Ok(item)
    }

    /// Live items in the order they were added.
    pub fn list_items(
        &self,
        db: &dyn DbExecutor,
        actor: Uuid,
        list_id: Uuid,
    ) -> Result<Vec<ShoppingListItem>, PantryError> {
        let list = self.get_list(db, actor, list_id)?;
        Ok(shopping_list::list_items(db, list.id)?)
    }

    pub fn update_item(
        &self,
        db: &dyn DbExecutor,
        actor: Uuid,
        list_id: Uuid,
        item_id: Uuid,
        input: &UpdateShoppingListItem,
    ) -> Result<ShoppingListItem, PantryError> {
        let tx = db.begin()?;
        let list = self.get_list(&tx, actor, list_id)?;
        self.check_outlet(&tx, input.preferred_outlet_id)?;
        let item = shopping_list::update_item(
            &tx,
            list.id,
            item_id,
            input.notes.as_deref(),
            input.preferred_outlet_id,
        )?
        .ok_or_else(|| PantryError::not_found("shopping list item"))?;
        shopping_list::touch(&tx, list.id)?;
        self.audit(
            &tx,
            "shopping_list_item.updated",
            "shopping_list_item",
            item.id,
            &list,
            actor,
            json!({ "shopping_list_id": list.id }),
        )?;
        tx.commit()?;
        Ok(item)
    }

    pub fn delete_item(&self, db: &dyn DbExecutor, actor: Uuid, list_id: Uuid, item_id: Uuid) -> Result<(), PantryError> {
        let tx = db.begin()?;
        let list = self.get_list(&tx, actor, list_id)?;
        if !shopping_list::soft_delete_item(&tx, list.id, item_id)? {
            return Err(PantryError::not_found("shopping list item"));
        }
        shopping_list::touch(&tx, list.id)?;
        self.audit(
            &tx,
            "shopping_list_item.deleted",
            "shopping_list_item",
            item_id,
            &list,
            actor,
            json!({ "shopping_list_id": list.id }),
        )?;
        tx.commit()?;
        Ok(())
    }

    fn check_target(&self, db: &dyn DbExecutor, inventory_id: Uuid, target: ItemTarget) -> Result<(), PantryError> {
        let found = match target {
            ItemTarget::CanonicalProduct(id) => catalog::canonical_in_inventory(db, id, inventory_id)?,
            ItemTarget::ProductVariant(id) => catalog::find_variant_with_inventory(db, id)?
                .is_some_and(|(_, owner)| owner == inventory_id),
        };
        if found {
            Ok(())
        } else {
            Err(PantryError::not_found("product"))
        }
    }

    fn check_outlet(&self, db: &dyn DbExecutor, outlet_id: Option<Uuid>) -> Result<(), PantryError> {
        match outlet_id {
            Some(id) if catalog::find_outlet(db, id)?.is_none() => Err(PantryError::not_found("outlet")),
            _ => Ok(()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn audit(
        &self,
        db: &dyn DbExecutor,
        action: &'static str,
        entity_type: &'static str,
        entity_id: Uuid,
        list: &ShoppingList,
        actor: Uuid,
        metadata: serde_json::Value,
    ) -> Result<(), PantryError> {
        self.activity.record(
            db,
            &ActivityEntry::new(action, entity_type, entity_id)
                .in_inventory(list.inventory_id)
                .by(actor)
                .with_metadata(metadata),
        )?;
        Ok(())
    }
}
