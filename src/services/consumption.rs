//! Usage history. Recording consumption never touches stock levels.

use serde_json::json;
use uuid::Uuid;

use crate::error::PantryError;
use crate::executor::DbExecutor;
use crate::models::consumption::{self, DEFAULT_SOURCE};
use crate::models::{catalog, ActivityEntry, ConsumptionEvent, NewConsumption};
use crate::pool::config::ListingConfig;
use crate::services::activity::ActivityLog;
use crate::services::membership::Authorizer;
use crate::services::{enter, PageRequest};

#[derive(Debug, Clone, Default)]
pub struct ConsumptionService {
    authz: Authorizer,
    activity: ActivityLog,
    listing: ListingConfig,
}

impl ConsumptionService {
    pub fn new(listing: ListingConfig) -> Self {
        Self {
            authz: Authorizer,
            activity: ActivityLog,
            listing,
        }
    }

    pub fn record_consumption(
        &self,
        db: &dyn DbExecutor,
        actor: Uuid,
        input: &NewConsumption,
    ) -> Result<ConsumptionEvent, PantryError> {
        if let Some(quantity) = input.quantity {
            if !quantity.is_finite() || quantity <= 0.0 {
                return Err(PantryError::invalid("consumed quantity must be a positive number"));
            }
        }
        let source = input
            .source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SOURCE);
        let _span = enter("consumption.record");

        let tx = db.begin()?;
        self.authz.require_member(&tx, actor, input.inventory_id)?;
        if let Some(canonical_id) = input.canonical_product_id {
            if !catalog::canonical_in_inventory(&tx, canonical_id, input.inventory_id)? {
                return Err(PantryError::not_found("canonical product"));
            }
        }
        let event = consumption::insert(&tx, actor, input, source)?;
        self.activity.record(
            &tx,
            &ActivityEntry::new("consumption.created", "consumption_event", event.id)
                .in_inventory(event.inventory_id)
                .by(actor)
                .with_metadata(json!({
                    "canonical_product_id": event.canonical_product_id,
                    "quantity": event.quantity,
                    "unit": event.unit,
                    "source": event.source,
                })),
        )?;
        tx.commit()?;

        log::info!("consumption {} recorded in inventory {}", event.id, event.inventory_id);
        Ok(event)
    }

    /// Most recent consumption first.
    pub fn list_consumption(
        &self,
        db: &dyn DbExecutor,
        actor: Uuid,
        inventory_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<ConsumptionEvent>, PantryError> {
        self.authz.require_member(db, actor, inventory_id)?;
        let page = self.listing.page(page.limit, page.offset);
        Ok(consumption::list_for_inventory(db, inventory_id, page)?)
    }
}
