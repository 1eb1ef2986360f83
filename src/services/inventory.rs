use serde_json::json;
use uuid::Uuid;

use crate::error::PantryError;
use crate::executor::DbExecutor;
use crate::models::{inventory, membership, user};
use crate::models::{ActivityEntry, Inventory, Role};
use crate::pool::config::ListingConfig;
use crate::services::activity::ActivityLog;
use crate::services::membership::Authorizer;
use crate::services::{enter, required, PageRequest};

#[derive(Debug, Clone, Default)]
pub struct InventoryService {
    authz: Authorizer,
    activity: ActivityLog,
    listing: ListingConfig,
}

impl InventoryService {
    pub fn new(listing: ListingConfig) -> Self {
        Self {
            authz: Authorizer,
            activity: ActivityLog,
            listing,
        }
    }

    /// Create an inventory owned by `owner`, who also joins it as admin.
    pub fn create_inventory(&self, db: &dyn DbExecutor, owner: Uuid, name: &str) -> Result<Inventory, PantryError> {
        let name = required("inventory name", name)?;
        let _span = enter("inventory.create");

        let tx = db.begin()?;
        if user::find_by_id(&tx, owner)?.is_none() {
            return Err(PantryError::not_found("user"));
        }
        let created = inventory::insert(&tx, name, owner)?;
        membership::insert_membership(&tx, created.id, owner, Role::Admin)?;
        self.activity.record(
            &tx,
            &ActivityEntry::new("inventory.created", "inventory", created.id)
                .in_inventory(created.id)
                .by(owner)
                .with_metadata(json!({ "name": created.name })),
        )?;
        tx.commit()?;

        log::info!("inventory {} created by {owner}", created.id);
        Ok(created)
    }

    /// `NotFound` for inventories the actor cannot see.
    pub fn get_inventory(&self, db: &dyn DbExecutor, actor: Uuid, id: Uuid) -> Result<Inventory, PantryError> {
        let found = inventory::find_live(db, id)?.ok_or_else(|| PantryError::not_found("inventory"))?;
        self.authz.require_visible(db, actor, id, "inventory")?;
        Ok(found)
    }

    /// Inventories the user owns or has joined, newest first.
    pub fn list_inventories(
        &self,
        db: &dyn DbExecutor,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<Inventory>, PantryError> {
        let page = self.listing.page(page.limit, page.offset);
        Ok(inventory::list_for_user(db, user_id, page)?)
    }
}
