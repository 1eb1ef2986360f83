//! Domain error taxonomy shared by every service.

use std::fmt;

use crate::executor::DbError;
use crate::transaction::TransactionError;

/// Failure of a service operation
#[derive(Debug)]
pub enum PantryError {
    /// The actor may not perform this operation on this inventory
    Unauthorized(String),
    /// The referenced entity does not exist, or is not visible to the actor
    NotFound(String),
    /// The request was rejected before touching the database
    InvalidInput(String),
    /// The request contradicts current state (e.g. an invitation already used)
    Conflict(String),
    /// Infrastructure failure from the persistence layer
    Database(DbError),
    /// Internal failure unrelated to the request
    Internal(String),
}

/// Coarse classification a transport boundary maps to its own codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    NotFound,
    InvalidInput,
    Conflict,
    Internal,
}

impl ErrorKind {
    /// HTTP status conventionally used for this kind
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::Unauthorized => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::InvalidInput => 400,
            ErrorKind::Conflict => 409,
            ErrorKind::Internal => 500,
        }
    }
}

impl PantryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PantryError::Unauthorized(_) => ErrorKind::Unauthorized,
            PantryError::NotFound(_) => ErrorKind::NotFound,
            PantryError::InvalidInput(_) => ErrorKind::InvalidInput,
            PantryError::Conflict(_) => ErrorKind::Conflict,
            PantryError::Database(_) | PantryError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn not_a_member() -> Self {
        PantryError::Unauthorized("user is not a member of this inventory".to_string())
    }

    pub(crate) fn not_found(entity: &str) -> Self {
        PantryError::NotFound(format!("{entity} not found"))
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        PantryError::InvalidInput(message.into())
    }

    /// Map a unique-constraint violation to `Conflict`, passing other errors through.
    pub(crate) fn conflict_on_duplicate(err: DbError, message: &str) -> Self {
        if err.is_unique_violation() {
            PantryError::Conflict(message.to_string())
        } else {
            PantryError::Database(err)
        }
    }
}

impl fmt::Display for PantryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PantryError::Unauthorized(s) => write!(f, "Unauthorized: {s}"),
            PantryError::NotFound(s) => write!(f, "Not found: {s}"),
            PantryError::InvalidInput(s) => write!(f, "Invalid input: {s}"),
            PantryError::Conflict(s) => write!(f, "Conflict: {s}"),
            PantryError::Database(e) => write!(f, "Database error: {e}"),
            PantryError::Internal(s) => write!(f, "Internal error: {s}"),
        }
    }
}

impl std::error::Error for PantryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PantryError::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DbError> for PantryError {
    fn from(err: DbError) -> Self {
        PantryError::Database(err)
    }
}

impl From<TransactionError> for PantryError {
    fn from(err: TransactionError) -> Self {
        PantryError::Database(err.into())
    }
}
