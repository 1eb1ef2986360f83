use uuid::Uuid;

use crate::error::PantryError;
use crate::executor::DbExecutor;
use crate::models::user;
use crate::models::{NewUser, User};
use crate::services::{normalize_email, required};

/// Account records. Password hashing and sessions belong to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserService;

impl UserService {
    /// Create an account; emails are unique ignoring case.
    pub fn register(&self, db: &dyn DbExecutor, input: &NewUser) -> Result<User, PantryError> {
        let clean = NewUser {
            email: normalize_email(&input.email)?,
            name: required("name", &input.name)?.to_string(),
            password_hash: required("password hash", &input.password_hash)?.to_string(),
        };
        let created = user::insert(db, &clean)
            .map_err(|e| PantryError::conflict_on_duplicate(e, "email is already registered"))?;
        log::info!("registered user {}", created.id);
        Ok(created)
    }

    pub fn find_by_email(&self, db: &dyn DbExecutor, email: &str) -> Result<Option<User>, PantryError> {
        Ok(user::find_by_email(db, email.trim())?)
    }

    pub fn get(&self, db: &dyn DbExecutor, id: Uuid) -> Result<User, PantryError> {
        user::find_by_id(db, id)?.ok_or_else(|| PantryError::not_found("user"))
    }
}
