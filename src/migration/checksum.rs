//! Checksum calculation for migrations

use super::migration::Migration;
use sha2::{Digest, Sha256};

/// SHA-256 over a migration's rendered SQL, one statement per line
///
/// Stored alongside each applied version so later edits to an applied
/// migration are caught.
pub fn calculate_checksum(migration: &dyn Migration) -> String {
    let mut hasher = Sha256::new();
    for statement in migration.statements() {
        hasher.update(statement.to_sql().as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}
