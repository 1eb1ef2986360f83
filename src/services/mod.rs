//! Business operations.
//!
//! Every method takes the persistence scope first as `&dyn DbExecutor`, so the
//! same call runs on a pooled connection or inside a transaction the caller
//! already holds. Multi-statement writes open their own scope with
//! `db.begin()`, which nests as a savepoint when the caller's scope is itself a
//! transaction.

pub mod activity;
pub mod catalog;
pub mod consumption;
pub mod inventory;
pub mod membership;
pub mod shopping_list;
pub mod stock;
pub mod transactions;
pub mod users;

pub use activity::ActivityLog;
pub use catalog::CatalogService;
pub use consumption::ConsumptionService;
pub use inventory::InventoryService;
pub use membership::{Authorizer, InviteInput, MembershipService};
pub use shopping_list::{ShoppingListService, UpdateShoppingListItem};
pub use stock::{stock_delta, StockEngine, StockLine};
pub use transactions::{compute_total, CreateTransactionInput, TransactionService};
pub use users::UserService;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::PantryError;

/// Caller-supplied paging, resolved against `ListingConfig`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl PageRequest {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
        }
    }
}

static EMAIL_RE: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$"));

/// Trim an email address and check its shape.
pub(crate) fn normalize_email(raw: &str) -> Result<String, PantryError> {
    let email = raw.trim();
    if email.is_empty() {
        return Err(PantryError::invalid("email must not be blank"));
    }
    let re = EMAIL_RE
        .as_ref()
        .map_err(|e| PantryError::Internal(format!("invalid email pattern: {e}")))?;
    if !re.is_match(email) {
        return Err(PantryError::invalid(format!("`{email}` is not a valid email address")));
    }
    Ok(email.to_string())
}

/// Trim a required text field, rejecting blanks.
pub(crate) fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, PantryError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PantryError::invalid(format!("{field} must not be blank")));
    }
    Ok(trimmed)
}

#[cfg(feature = "tracing")]
pub(crate) fn enter(operation: &'static str) -> tracing::span::EnteredSpan {
    crate::metrics::tracing_helpers::operation_span(operation).entered()
}

#[cfg(not(feature = "tracing"))]
pub(crate) fn enter(_operation: &'static str) {}
