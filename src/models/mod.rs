//! Domain records and the SQL that reads and writes them.
//!
//! Functions here take any `DbExecutor` and do no authorization; the services
//! decide who may call them and inside which scope.

pub mod activity;
pub mod catalog;
pub mod consumption;
pub mod inventory;
pub mod membership;
pub mod shopping_list;
pub mod stock;
pub mod transaction;
pub mod user;

pub use activity::{ActivityEntry, ActivityRecord};
pub use catalog::{
    CanonicalProduct, NewCanonicalProduct, NewOutlet, NewProduct, NewVariant, Outlet,
    OutletChannel, Product, ProductVariant, Seller,
};
pub use consumption::{ConsumptionEvent, NewConsumption};
pub use inventory::Inventory;
pub use membership::{Invitation, InvitationStatus, Membership, MembershipState, Role};
pub use shopping_list::{ItemTarget, NewShoppingListItem, ShoppingList, ShoppingListItem};
pub use stock::StockRow;
pub use transaction::{NewTransactionItem, Transaction, TransactionItem, TransactionWithItems};
pub use user::{NewUser, User};
