//! The pantry schema, as ordered migrations.
//!
//! Tables are built with sea-query; partial and expression indexes and CHECK
//! constraints are raw DDL.

use super::migration::{Migration, SchemaStatement};
use sea_query::{ColumnDef, Expr, Index, Table, TableAlterStatement, TableCreateStatement};

/// All schema migrations in version order
pub fn all() -> Vec<Box<dyn Migration>> {
    vec![
        Box::new(CreateAccounts),
        Box::new(CreateCatalog),
        Box::new(CreateShoppingLists),
        Box::new(CreateLedger),
        Box::new(NumberTransactionItems),
    ]
}

fn id() -> ColumnDef {
    ColumnDef::new("id")
        .uuid()
        .not_null()
        .primary_key()
        .default(Expr::cust("gen_random_uuid()"))
        .to_owned()
}

fn text(name: &str) -> ColumnDef {
    ColumnDef::new(name.to_string()).text().not_null().to_owned()
}

fn optional_text(name: &str) -> ColumnDef {
    ColumnDef::new(name.to_string()).text().null().to_owned()
}

fn timestamp_now(name: &str) -> ColumnDef {
    ColumnDef::new(name.to_string())
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

fn optional_timestamp(name: &str) -> ColumnDef {
    ColumnDef::new(name.to_string()).timestamp_with_time_zone().null().to_owned()
}

fn reference(name: &str, table: &str) -> ColumnDef {
    ColumnDef::new(name.to_string())
        .uuid()
        .not_null()
        .extra(format!("REFERENCES {table} (id)"))
        .to_owned()
}

fn optional_reference(name: &str, table: &str) -> ColumnDef {
    ColumnDef::new(name.to_string())
        .uuid()
        .null()
        .extra(format!("REFERENCES {table} (id)"))
        .to_owned()
}

fn table(name: &str, columns: Vec<ColumnDef>) -> SchemaStatement {
    let mut create = Table::create();
    create.table(name.to_string()).if_not_exists();
    for column in columns {
        create.col(column);
    }
    SchemaStatement::Table(create.to_owned())
}

fn index(name: &str, table: &str, columns: &[&str]) -> SchemaStatement {
    let mut create = Index::create();
    create.if_not_exists().name(name).table(table.to_string());
    for column in columns {
        create.col(Expr::col(column.to_string()));
    }
    SchemaStatement::Index(create.to_owned())
}

fn raw(sql: &str) -> SchemaStatement {
    SchemaStatement::Raw(sql.to_string())
}

/// Users, inventories, memberships and invitations
pub struct CreateAccounts;

impl Migration for CreateAccounts {
    fn name(&self) -> &str {
        "create_accounts"
    }

    fn version(&self) -> i64 {
        20250101000001
    }

    fn statements(&self) -> Vec<SchemaStatement> {
        vec![
            table(
                "users",
                vec![
                    id(),
                    text("email"),
                    text("name"),
                    text("password_hash"),
                    timestamp_now("created_at"),
                ],
            ),
            raw("CREATE UNIQUE INDEX IF NOT EXISTS users_email_lower_key ON users (lower(email))"),
            table(
                "inventories",
                vec![
                    id(),
                    text("name"),
                    reference("owner_user_id", "users"),
                    timestamp_now("created_at"),
                    optional_timestamp("deleted_at"),
                ],
            ),
            index("idx_inventories_owner", "inventories", &["owner_user_id"]),
            table(
                "inventory_memberships",
                vec![
                    id(),
                    reference("inventory_id", "inventories"),
                    reference("user_id", "users"),
                    text("role"),
                    timestamp_now("created_at"),
                    optional_timestamp("removed_at"),
                ],
            ),
            raw("ALTER TABLE inventory_memberships ADD CONSTRAINT inventory_memberships_role_check \
                 CHECK (role IN ('admin', 'editor', 'viewer'))"),
            raw("CREATE UNIQUE INDEX IF NOT EXISTS inventory_memberships_active_key \
                 ON inventory_memberships (inventory_id, user_id) WHERE removed_at IS NULL"),
            index("idx_inventory_memberships_user", "inventory_memberships", &["user_id"]),
            table(
                "invitations",
                vec![
                    id(),
                    reference("inventory_id", "inventories"),
                    text("email"),
                    text("role"),
                    reference("invited_by_user_id", "users"),
                    ColumnDef::new("status").text().not_null().default("pending").to_owned(),
                    timestamp_now("created_at"),
                    optional_timestamp("accepted_at"),
                    optional_timestamp("expires_at"),
                ],
            ),
            raw("ALTER TABLE invitations ADD CONSTRAINT invitations_state_check \
                 CHECK (role IN ('admin', 'editor', 'viewer') AND status IN ('pending', 'accepted'))"),
            index("idx_invitations_inventory", "invitations", &["inventory_id"]),
        ]
    }
}

/// Canonical products, products, variants, sellers and outlets
pub struct CreateCatalog;

impl Migration for CreateCatalog {
    fn name(&self) -> &str {
        "create_catalog"
    }

    fn version(&self) -> i64 {
        20250101000002
    }

    fn statements(&self) -> Vec<SchemaStatement> {
        vec![
            table(
                "canonical_products",
                vec![
                    id(),
                    reference("inventory_id", "inventories"),
                    text("name"),
                    optional_text("description"),
                    optional_text("category"),
                    timestamp_now("created_at"),
                    timestamp_now("updated_at"),
                    optional_timestamp("deleted_at"),
                ],
            ),
            index("idx_canonical_products_inventory", "canonical_products", &["inventory_id"]),
            table(
                "products",
                vec![
                    id(),
                    reference("inventory_id", "inventories"),
                    optional_reference("canonical_product_id", "canonical_products"),
                    optional_text("brand"),
                    text("name"),
                    optional_text("description"),
                    optional_text("category"),
                    timestamp_now("created_at"),
                    optional_timestamp("deleted_at"),
                ],
            ),
            index("idx_products_inventory", "products", &["inventory_id"]),
            table(
                "product_variants",
                vec![
                    id(),
                    reference("product_id", "products"),
                    text("variant_name"),
                    optional_text("sku"),
                    optional_text("unit"),
                    ColumnDef::new("size").double().null().to_owned(),
                    timestamp_now("created_at"),
                    optional_timestamp("deleted_at"),
                ],
            ),
            raw("ALTER TABLE product_variants ADD CONSTRAINT product_variants_size_check \
                 CHECK (size IS NULL OR size > 0)"),
            index("idx_product_variants_product", "product_variants", &["product_id"]),
            table("sellers", vec![id(), text("name"), timestamp_now("created_at")]),
            table(
                "outlets",
                vec![
                    id(),
                    reference("seller_id", "sellers"),
                    text("name"),
                    text("channel"),
                    optional_text("address"),
                    optional_text("website_url"),
                    timestamp_now("created_at"),
                ],
            ),
            raw("ALTER TABLE outlets ADD CONSTRAINT outlets_channel_check \
                 CHECK (channel IN ('physical', 'online'))"),
        ]
    }
}

/// Shopping lists and their items
pub struct CreateShoppingLists;

impl Migration for CreateShoppingLists {
    fn name(&self) -> &str {
        "create_shopping_lists"
    }

    fn version(&self) -> i64 {
        20250101000003
    }

    fn statements(&self) -> Vec<SchemaStatement> {
        vec![
            table(
                "shopping_lists",
                vec![
                    id(),
                    reference("inventory_id", "inventories"),
                    text("name"),
                    reference("created_by", "users"),
                    timestamp_now("created_at"),
                    timestamp_now("last_updated_at"),
                    optional_timestamp("deleted_at"),
                ],
            ),
            index("idx_shopping_lists_inventory", "shopping_lists", &["inventory_id"]),
            table(
                "shopping_list_items",
                vec![
                    id(),
                    reference("shopping_list_id", "shopping_lists"),
                    optional_reference("canonical_product_id", "canonical_products"),
                    optional_reference("product_variant_id", "product_variants"),
                    optional_reference("preferred_outlet_id", "outlets"),
                    optional_text("notes"),
                    timestamp_now("created_at"),
                    optional_timestamp("deleted_at"),
                ],
            ),
            raw("ALTER TABLE shopping_list_items ADD CONSTRAINT shopping_list_items_target_check \
                 CHECK (num_nonnulls(canonical_product_id, product_variant_id) = 1)"),
            index("idx_shopping_list_items_list", "shopping_list_items", &["shopping_list_id"]),
        ]
    }
}

fn ledger_transactions() -> TableCreateStatement {
    Table::create()
        .table("transactions")
        .if_not_exists()
        .col(id())
        .col(reference("inventory_id", "inventories"))
        .col(optional_reference("outlet_id", "outlets"))
        .col(reference("created_by_user_id", "users"))
        .col(timestamp_now("transaction_date"))
        .col(
            ColumnDef::new("total_amount")
                .decimal_len(14, 4)
                .not_null()
                .default(0),
        )
        .col(timestamp_now("created_at"))
        .to_owned()
}

/// Transactions, line items, stock, consumption and the activity log
pub struct CreateLedger;

impl Migration for CreateLedger {
    fn name(&self) -> &str {
        "create_ledger"
    }

    fn version(&self) -> i64 {
        20250101000004
    }

    fn statements(&self) -> Vec<SchemaStatement> {
        vec![
            SchemaStatement::Table(ledger_transactions()),
            index(
                "idx_transactions_inventory_date",
                "transactions",
                &["inventory_id", "transaction_date"],
            ),
            table(
                "transaction_items",
                vec![
                    id(),
                    reference("transaction_id", "transactions"),
                    reference("product_variant_id", "product_variants"),
                    ColumnDef::new("quantity").double().not_null().to_owned(),
                    ColumnDef::new("price_per_unit").decimal_len(14, 4).null().to_owned(),
                    optional_reference("shopping_list_item_id", "shopping_list_items"),
                    timestamp_now("created_at"),
                ],
            ),
            raw("ALTER TABLE transaction_items ADD CONSTRAINT transaction_items_amounts_check \
                 CHECK (quantity > 0 AND (price_per_unit IS NULL OR price_per_unit >= 0))"),
            index("idx_transaction_items_transaction", "transaction_items", &["transaction_id"]),
            table(
                "inventory_products",
                vec![
                    id(),
                    reference("inventory_id", "inventories"),
                    reference("product_variant_id", "product_variants"),
                    ColumnDef::new("quantity").double().not_null().default(0.0).to_owned(),
                    optional_text("unit"),
                    timestamp_now("created_at"),
                    timestamp_now("last_updated"),
                ],
            ),
            SchemaStatement::Index(
                Index::create()
                    .if_not_exists()
                    .unique()
                    .name("inventory_products_inventory_variant_key")
                    .table("inventory_products")
                    .col(Expr::col("inventory_id"))
                    .col(Expr::col("product_variant_id"))
                    .to_owned(),
            ),
            table(
                "consumption_events",
                vec![
                    id(),
                    reference("inventory_id", "inventories"),
                    optional_reference("canonical_product_id", "canonical_products"),
                    reference("created_by_user_id", "users"),
                    ColumnDef::new("quantity").double().null().to_owned(),
                    optional_text("unit"),
                    optional_text("note"),
                    ColumnDef::new("source").text().not_null().default("manual").to_owned(),
                    timestamp_now("consumed_at"),
                    timestamp_now("created_at"),
                ],
            ),
            index(
                "idx_consumption_events_inventory",
                "consumption_events",
                &["inventory_id", "consumed_at"],
            ),
            table(
                "activity_logs",
                vec![
                    id(),
                    optional_reference("inventory_id", "inventories"),
                    optional_reference("user_id", "users"),
                    text("action"),
                    text("entity_type"),
                    ColumnDef::new("entity_id").uuid().null().to_owned(),
                    ColumnDef::new("metadata").json_binary().null().to_owned(),
                    timestamp_now("created_at"),
                ],
            ),
            index(
                "idx_activity_logs_inventory",
                "activity_logs",
                &["inventory_id", "created_at"],
            ),
        ]
    }
}

/// Line numbers for purchase items, so they read back in submission order
pub struct NumberTransactionItems;

fn line_number_column() -> TableAlterStatement {
    Table::alter()
        .table("transaction_items")
        .add_column_if_not_exists(ColumnDef::new("line_no").integer().not_null().default(0))
        .to_owned()
}

impl Migration for NumberTransactionItems {
    fn name(&self) -> &str {
        "number_transaction_items"
    }

    fn version(&self) -> i64 {
        20250101000005
    }

    fn statements(&self) -> Vec<SchemaStatement> {
        vec![
            SchemaStatement::Alter(line_number_column()),
            raw("UPDATE transaction_items t SET line_no = n.line_no \
                 FROM (SELECT id, (row_number() OVER (PARTITION BY transaction_id ORDER BY created_at, id) - 1)::INT4 AS line_no \
                       FROM transaction_items) n \
                 WHERE t.id = n.id"),
            SchemaStatement::Index(
                Index::create()
                    .if_not_exists()
                    .unique()
                    .name("transaction_items_transaction_line_key")
                    .table("transaction_items")
                    .col(Expr::col("transaction_id"))
                    .col(Expr::col("line_no"))
                    .to_owned(),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(migration: &dyn Migration) -> Vec<String> {
        migration.statements().iter().map(SchemaStatement::to_sql).collect()
    }

    #[test]
    fn test_every_table_is_created_once() {
        let mut tables = Vec::new();
        for migration in all() {
            for sql in rendered(migration.as_ref()) {
                if let Some(rest) = sql.strip_prefix("CREATE TABLE IF NOT EXISTS \"") {
                    tables.push(rest.split('"').next().unwrap_or_default().to_string());
                }
            }
        }
        let expected = [
            "users",
            "inventories",
            "inventory_memberships",
            "invitations",
            "canonical_products",
            "products",
            "product_variants",
            "sellers",
            "outlets",
            "shopping_lists",
            "shopping_list_items",
            "transactions",
            "transaction_items",
            "inventory_products",
            "consumption_events",
            "activity_logs",
        ];
        assert_eq!(tables, expected);
    }

    #[test]
    fn test_ids_default_to_generated_uuids() {
        let sql = rendered(&CreateAccounts).remove(0);
        assert!(sql.contains("gen_random_uuid()"), "{sql}");
    }

    #[test]
    fn test_foreign_keys_are_rendered() {
        let sql = rendered(&CreateLedger).remove(0);
        assert!(sql.contains("REFERENCES inventories (id)"), "{sql}");
        assert!(sql.contains("REFERENCES outlets (id)"), "{sql}");
    }

    #[test]
    fn test_active_membership_uniqueness_is_partial() {
        let sql = rendered(&CreateAccounts).join("\n");
        assert!(sql.contains("WHERE removed_at IS NULL"));
    }

    #[test]
    fn test_line_numbers_added_and_unique_per_transaction() {
        let sql = rendered(&NumberTransactionItems);
        assert!(sql[0].starts_with("ALTER TABLE \"transaction_items\""), "{}", sql[0]);
        assert!(sql[0].contains("ADD COLUMN IF NOT EXISTS \"line_no\""), "{}", sql[0]);
        assert!(sql[2].contains("CREATE UNIQUE INDEX"), "{}", sql[2]);
        assert!(sql[2].contains("transaction_items_transaction_line_key"));
    }

    #[test]
    fn test_stock_rows_are_unique_per_variant() {
        let sql = rendered(&CreateLedger).join("\n");
        assert!(sql.contains("CREATE UNIQUE INDEX"), "{sql}");
        assert!(sql.contains("inventory_products_inventory_variant_key"));
    }
}
