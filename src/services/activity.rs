//! Append-only audit trail.
//!
//! Entries are written with the same `DbExecutor` as the change they describe,
//! so a rolled-back operation leaves no entry behind.

use uuid::Uuid;

use crate::error::PantryError;
use crate::executor::DbExecutor;
use crate::models::activity;
use crate::models::{ActivityEntry, ActivityRecord};
use crate::pool::config::Page;

#[derive(Debug, Clone, Copy, Default)]
pub struct ActivityLog;

impl ActivityLog {
    pub fn record(&self, db: &dyn DbExecutor, entry: &ActivityEntry) -> Result<ActivityRecord, PantryError> {
        let record = activity::insert(db, entry)?;
        log::debug!(
            "activity {} on {} {:?} by {:?}",
            record.action,
            record.entity_type,
            record.entity_id,
            record.user_id
        );
        Ok(record)
    }

    /// Entries for one inventory, newest first. Not gated: callers check access.
    pub fn list_for_inventory(
        &self,
        db: &dyn DbExecutor,
        inventory_id: Uuid,
        page: Page,
    ) -> Result<Vec<ActivityRecord>, PantryError> {
        Ok(activity::list_for_inventory(db, inventory_id, page)?)
    }
}
