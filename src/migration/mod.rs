//! Migration system for the pantry schema
//!
//! This module provides:
//! - The `Migration` trait and the `SchemaStatement`s migrations are made of
//! - `SchemaManager` for running schema statements
//! - The `pantry_migrations` state table with SHA-256 checksums
//! - Flyway-style locking so concurrent processes apply each version once
//! - The embedded schema migrations (`schema`)
//!
//! # Example
//!
//! ```rust,no_run
//! use pantry::migration::Migrator;
//! # fn run(db: &dyn pantry::DbExecutor) -> Result<(), pantry::migration::MigrationError> {
//! let applied = Migrator::embedded().up(db, None)?;
//! println!("applied {applied} migrations");
//! # Ok(())
//! # }
//! ```

pub mod checksum;
pub mod error;
pub mod lock;
pub mod migration;
pub mod migrator;
pub mod record;
pub mod schema;
pub mod schema_manager;
pub mod state_table;
pub mod status;

pub use checksum::calculate_checksum;
pub use error::MigrationError;
pub use lock::MigrationLockGuard;
pub use migration::{Migration, SchemaStatement};
pub use migrator::Migrator;
pub use record::MigrationRecord;
pub use schema_manager::SchemaManager;
pub use state_table::initialize_state_table;
pub use status::{MigrationStatus, PendingMigration};

/// Name of the table that tracks applied migrations
pub const STATE_TABLE: &str = "pantry_migrations";
