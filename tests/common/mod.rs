//! Shared fixtures for the database-backed integration tests.
//!
//! Every test builds its own users and inventories with unique emails, so the
//! suites can share one database and run in parallel.

#![allow(dead_code)]

use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;
use uuid::Uuid;

use pantry::models::{Inventory, NewProduct, NewUser, NewVariant, ProductVariant, User};
use pantry::raw_sql::query_value;
use pantry::test_helpers::TestDatabase;
use pantry::{DbExecutor, Pantry, PantryConfig, PgExecutor};

pub struct Fixture {
    pub db: TestDatabase,
    pub conn: PgExecutor,
    pub pantry: Pantry,
}

/// `None` (after a notice) when `TEST_DATABASE_URL` is unset.
pub fn fixture() -> Option<Fixture> {
    fixture_with(PantryConfig::default())
}

pub fn fixture_with(config: PantryConfig) -> Option<Fixture> {
    let db = TestDatabase::from_env().expect("Failed to prepare test database")?;
    let conn = db.executor().expect("Failed to connect to test database");
    Some(Fixture {
        db,
        conn,
        pantry: Pantry::new(&config),
    })
}

pub fn unique_email() -> String {
    let email: String = SafeEmail().fake();
    format!("{}.{email}", Uuid::new_v4().simple())
}

impl Fixture {
    pub fn user(&self) -> User {
        self.user_with_email(&unique_email())
    }

    pub fn user_with_email(&self, email: &str) -> User {
        let name: String = Name().fake();
        self.pantry
            .users
            .register(
                &self.conn,
                &NewUser {
                    email: email.to_string(),
                    name,
                    password_hash: "$argon2id$v=19$test".to_string(),
                },
            )
            .expect("Failed to register user")
    }

    pub fn inventory(&self, owner: &User) -> Inventory {
        self.pantry
            .inventories
            .create_inventory(&self.conn, owner.id, "Home")
            .expect("Failed to create inventory")
    }

    /// A product with one variant of the given package size and unit
    pub fn variant(&self, actor: &User, inventory: &Inventory, size: Option<f64>, unit: Option<&str>) -> ProductVariant {
        let product = self
            .pantry
            .catalog
            .create_product(
                &self.conn,
                actor.id,
                inventory.id,
                &NewProduct {
                    name: "Whole milk".to_string(),
                    brand: Some("Dairy Co".to_string()),
                    ..NewProduct::default()
                },
            )
            .expect("Failed to create product");
        self.pantry
            .catalog
            .create_variant(
                &self.conn,
                actor.id,
                product.id,
                &NewVariant {
                    variant_name: "Bottle".to_string(),
                    unit: unit.map(str::to_string),
                    size,
                    ..NewVariant::default()
                },
            )
            .expect("Failed to create variant")
    }

    /// Invite `user` with the default role and accept on their behalf
    pub fn join(&self, owner: &User, inventory: &Inventory, user: &User) {
        let invitation = self
            .pantry
            .membership
            .invite_user(
                &self.conn,
                owner.id,
                inventory.id,
                &pantry::services::InviteInput::new(user.email.clone()),
            )
            .expect("Failed to invite");
        self.pantry
            .membership
            .accept_invitation(&self.conn, user.id, invitation.id)
            .expect("Failed to accept");
    }
}

pub fn count(db: &dyn DbExecutor, sql: &str, id: Uuid) -> i64 {
    query_value::<i64>(db, sql, &[&id]).expect("Failed to count rows")
}

pub fn audit_count(db: &dyn DbExecutor, action: &str, entity_id: Uuid) -> i64 {
    query_value::<i64>(
        db,
        "SELECT COUNT(*) FROM activity_logs WHERE action = $1 AND entity_id = $2",
        &[&action, &entity_id],
    )
    .expect("Failed to count audit entries")
}
