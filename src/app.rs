//! Composition root: every service wired from one `PantryConfig`.

use crate::executor::{DbError, DbExecutor};
use crate::migration::{MigrationError, Migrator};
use crate::pool::config::PantryConfig;
use crate::pool::manager::DbPool;
use crate::services::{
    ActivityLog, CatalogService, ConsumptionService, InventoryService, MembershipService, ShoppingListService,
    StockEngine, TransactionService, UserService,
};

/// The household inventory core.
///
/// Holds no connection itself: pass a `PooledConnection`, a `PgExecutor` or an
/// open `Transaction` to each call.
///
/// # Examples
///
/// ```no_run
/// use pantry::{Pantry, PantryConfig};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = PantryConfig::load()?;
/// let pantry = Pantry::new(&config);
/// let pool = pantry.connect_pool(&config)?;
/// let conn = pool.acquire()?;
/// pantry.migrate(&*conn)?;
/// let members = pantry.membership.list_members(&*conn, uuid::Uuid::nil(), uuid::Uuid::nil());
/// # let _ = members;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Pantry {
    pub users: UserService,
    pub inventories: InventoryService,
    pub membership: MembershipService,
    pub catalog: CatalogService,
    pub stock: StockEngine,
    pub transactions: TransactionService,
    pub consumption: ConsumptionService,
    pub shopping_lists: ShoppingListService,
    pub activity: ActivityLog,
}

impl Pantry {
    pub fn new(config: &PantryConfig) -> Self {
        let listing = config.listing;
        Self {
            users: UserService,
            inventories: InventoryService::new(listing),
            membership: MembershipService::new(config.membership),
            catalog: CatalogService::new(listing),
            stock: StockEngine::new(listing),
            transactions: TransactionService::new(listing),
            consumption: ConsumptionService::new(listing),
            shopping_lists: ShoppingListService::new(listing),
            activity: ActivityLog,
        }
    }

    /// Open the connection pool described by `config.database`.
    pub fn connect_pool(&self, config: &PantryConfig) -> Result<DbPool, DbError> {
        DbPool::connect(&config.database)
    }

    /// Apply every pending embedded migration. Returns how many ran.
    pub fn migrate(&self, db: &dyn DbExecutor) -> Result<usize, MigrationError> {
        Migrator::embedded().up(db, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::config::{ListingConfig, MembershipConfig};

    #[test]
    fn test_services_pick_up_config() {
        let config = PantryConfig {
            listing: ListingConfig {
                default_limit: 5,
                max_limit: 50,
            },
            membership: MembershipConfig {
                require_invitee_email_match: true,
            },
            ..PantryConfig::default()
        };
        let pantry = Pantry::new(&config);
        let rendered = format!("{:?}", pantry.membership);
        assert!(rendered.contains("require_invitee_email_match: true"));
        assert!(format!("{:?}", pantry.transactions).contains("default_limit: 5"));
    }
}
