//! # Pantry
//!
//! Coroutine-native household inventory core on PostgreSQL, built on the `may`
//! runtime: shared inventories with owner/member access, an invitation flow,
//! purchase recording that accumulates stock atomically, and an append-only
//! audit log written in the same transaction as each change.
//!
//! Every service call takes a [`DbExecutor`] as its first argument, so the same
//! operation runs on a pooled connection or inside a transaction the caller holds.

pub mod app;
pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod migration;
pub mod models;
pub mod pool;
pub mod raw_sql;
pub mod services;
#[doc(hidden)]
pub mod test_helpers;
pub mod transaction;

pub use app::Pantry;
pub use config::{PantryConfig, Page};
pub use connection::{connect, ConnectionError};
pub use error::{ErrorKind, PantryError};
pub use executor::{DbError, DbExecutor, PgExecutor};
pub use pool::{DbPool, PooledConnection};
pub use services::PageRequest;
pub use transaction::{IsolationLevel, Transaction, TransactionError};
