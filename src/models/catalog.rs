use chrono::{DateTime, Utc};
use may_postgres::Row;
use serde::Serialize;
use std::str::FromStr;
use uuid::Uuid;

use crate::executor::{DbError, DbExecutor};
use crate::pool::config::Page;
use crate::raw_sql::{column, exists, fetch_all, fetch_one, fetch_optional, FromRow};

/// Inventory-scoped product concept ("milk"), independent of brand or pack size
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalProduct {
    pub id: Uuid,
    pub inventory_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FromRow for CanonicalProduct {
    fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: column(row, "id")?,
            inventory_id: column(row, "inventory_id")?,
            name: column(row, "name")?,
            description: column(row, "description")?,
            category: column(row, "category")?,
            created_at: column(row, "created_at")?,
            updated_at: column(row, "updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewCanonicalProduct {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
}

/// A branded product; purchasable through its variants
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub inventory_id: Uuid,
    pub canonical_product_id: Option<Uuid>,
    pub brand: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FromRow for Product {
    fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: column(row, "id")?,
            inventory_id: column(row, "inventory_id")?,
            canonical_product_id: column(row, "canonical_product_id")?,
            brand: column(row, "brand")?,
            name: column(row, "name")?,
            description: column(row, "description")?,
            category: column(row, "category")?,
            created_at: column(row, "created_at")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewProduct {
    pub name: String,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub canonical_product_id: Option<Uuid>,
}

/// A purchasable form of a product; `size` is the package multiplier for stock
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductVariant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_name: String,
    pub sku: Option<String>,
    pub unit: Option<String>,
    pub size: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl FromRow for ProductVariant {
    fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: column(row, "id")?,
            product_id: column(row, "product_id")?,
            variant_name: column(row, "variant_name")?,
            sku: column(row, "sku")?,
            unit: column(row, "unit")?,
            size: column(row, "size")?,
            created_at: column(row, "created_at")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewVariant {
    pub variant_name: String,
    pub sku: Option<String>,
    pub unit: Option<String>,
    pub size: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Seller {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl FromRow for Seller {
    fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: column(row, "id")?,
            name: column(row, "name")?,
            created_at: column(row, "created_at")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutletChannel {
    #[default]
    Physical,
    Online,
}

impl OutletChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            OutletChannel::Physical => "physical",
            OutletChannel::Online => "online",
        }
    }
}

impl FromStr for OutletChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "physical" => Ok(OutletChannel::Physical),
            "online" => Ok(OutletChannel::Online),
            other => Err(format!("unknown outlet channel `{other}`")),
        }
    }
}

/// A place where purchases happen: a shop or a website of a seller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outlet {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub name: String,
    pub channel: OutletChannel,
    pub address: Option<String>,
    pub website_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FromRow for Outlet {
    fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: column(row, "id")?,
            seller_id: column(row, "seller_id")?,
            name: column(row, "name")?,
            channel: column::<String>(row, "channel")?
                .parse()
                .map_err(DbError::ParseError)?,
            address: column(row, "address")?,
            website_url: column(row, "website_url")?,
            created_at: column(row, "created_at")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewOutlet {
    pub name: String,
    pub channel: OutletChannel,
    pub address: Option<String>,
    pub website_url: Option<String>,
}

const CANONICAL_COLUMNS: &str = "id, inventory_id, name, description, category, created_at, updated_at";
const PRODUCT_COLUMNS: &str =
    "id, inventory_id, canonical_product_id, brand, name, description, category, created_at";
const VARIANT_COLUMNS: &str = "id, product_id, variant_name, sku, unit, size, created_at";
const OUTLET_COLUMNS: &str = "id, seller_id, name, channel, address, website_url, created_at";

/// `%term%` for ILIKE, with LIKE metacharacters escaped
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

pub fn insert_canonical(
    db: &dyn DbExecutor,
    inventory_id: Uuid,
    input: &NewCanonicalProduct,
) -> Result<CanonicalProduct, DbError> {
    fetch_one(
        db,
        &format!(
            "INSERT INTO canonical_products (inventory_id, name, description, category) \
             VALUES ($1, $2, $3, $4) RETURNING {CANONICAL_COLUMNS}"
        ),
        &[&inventory_id, &input.name, &input.description, &input.category],
    )
}

pub fn find_canonical(db: &dyn DbExecutor, id: Uuid) -> Result<Option<CanonicalProduct>, DbError> {
    fetch_optional(
        db,
        &format!("SELECT {CANONICAL_COLUMNS} FROM canonical_products WHERE id = $1 AND deleted_at IS NULL"),
        &[&id],
    )
}

pub fn canonical_in_inventory(db: &dyn DbExecutor, id: Uuid, inventory_id: Uuid) -> Result<bool, DbError> {
    exists(
        db,
        "SELECT 1 FROM canonical_products WHERE id = $1 AND inventory_id = $2 AND deleted_at IS NULL",
        &[&id, &inventory_id],
    )
}

pub fn list_canonical(
    db: &dyn DbExecutor,
    inventory_id: Uuid,
    search: Option<&str>,
    page: Page,
) -> Result<Vec<CanonicalProduct>, DbError> {
    let pattern = search.map(like_pattern);
    fetch_all(
        db,
        &format!(
            "SELECT {CANONICAL_COLUMNS} FROM canonical_products \
             WHERE inventory_id = $1 AND deleted_at IS NULL \
               AND ($2::text IS NULL OR name ILIKE $2) \
             ORDER BY name ASC, id ASC LIMIT $3 OFFSET $4"
        ),
        &[&inventory_id, &pattern, &page.limit, &page.offset],
    )
}

/// Replace the editable fields of a live canonical product
pub fn update_canonical(
    db: &dyn DbExecutor,
    id: Uuid,
    input: &NewCanonicalProduct,
) -> Result<Option<CanonicalProduct>, DbError> {
    fetch_optional(
        db,
        &format!(
            "UPDATE canonical_products \
             SET name = $2, description = $3, category = $4, updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {CANONICAL_COLUMNS}"
        ),
        &[&id, &input.name, &input.description, &input.category],
    )
}

/// Returns false if nothing live matched.
pub fn soft_delete_canonical(db: &dyn DbExecutor, id: Uuid) -> Result<bool, DbError> {
    let updated = db.execute(
        "UPDATE canonical_products SET deleted_at = now(), updated_at = now() \
         WHERE id = $1 AND deleted_at IS NULL",
        &[&id],
    )?;
    Ok(updated > 0)
}

pub fn insert_product(
    db: &dyn DbExecutor,
    inventory_id: Uuid,
    input: &NewProduct,
) -> Result<Product, DbError> {
    fetch_one(
        db,
        &format!(
            "INSERT INTO products (inventory_id, canonical_product_id, brand, name, description, category) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {PRODUCT_COLUMNS}"
        ),
        &[
            &inventory_id,
            &input.canonical_product_id,
            &input.brand,
            &input.name,
            &input.description,
            &input.category,
        ],
    )
}

pub fn find_product(db: &dyn DbExecutor, id: Uuid) -> Result<Option<Product>, DbError> {
    fetch_optional(
        db,
        &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND deleted_at IS NULL"),
        &[&id],
    )
}

pub fn list_products(
    db: &dyn DbExecutor,
    inventory_id: Uuid,
    search: Option<&str>,
    page: Page,
) -> Result<Vec<Product>, DbError> {
    let pattern = search.map(like_pattern);
    fetch_all(
        db,
        &format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE inventory_id = $1 AND deleted_at IS NULL \
               AND ($2::text IS NULL OR name ILIKE $2 OR brand ILIKE $2) \
             ORDER BY name ASC, id ASC LIMIT $3 OFFSET $4"
        ),
        &[&inventory_id, &pattern, &page.limit, &page.offset],
    )
}

/// Replace the editable fields of a live product
pub fn update_product(db: &dyn DbExecutor, id: Uuid, input: &NewProduct) -> Result<Option<Product>, DbError> {
    fetch_optional(
        db,
        &format!(
            "UPDATE products \
             SET canonical_product_id = $2, brand = $3, name = $4, description = $5, category = $6 \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {PRODUCT_COLUMNS}"
        ),
        &[
            &id,
            &input.canonical_product_id,
            &input.brand,
            &input.name,
            &input.description,
            &input.category,
        ],
    )
}

/// Soft delete a product; its variants stop resolving with it.
pub fn soft_delete_product(db: &dyn DbExecutor, id: Uuid) -> Result<bool, DbError> {
    let updated = db.execute(
        "UPDATE products SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL",
        &[&id],
    )?;
    Ok(updated > 0)
}

pub fn insert_variant(
    db: &dyn DbExecutor,
    product_id: Uuid,
    input: &NewVariant,
) -> Result<ProductVariant, DbError> {
    fetch_one(
        db,
        &format!(
            "INSERT INTO product_variants (product_id, variant_name, sku, unit, size) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {VARIANT_COLUMNS}"
        ),
        &[&product_id, &input.variant_name, &input.sku, &input.unit, &input.size],
    )
}

pub fn list_variants(db: &dyn DbExecutor, product_id: Uuid) -> Result<Vec<ProductVariant>, DbError> {
    fetch_all(
        db,
        &format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants \
             WHERE product_id = $1 AND deleted_at IS NULL ORDER BY created_at ASC, id ASC"
        ),
        &[&product_id],
    )
}

/// A live variant together with the inventory its product belongs to
pub fn find_variant_with_inventory(
    db: &dyn DbExecutor,
    id: Uuid,
) -> Result<Option<(ProductVariant, Uuid)>, DbError> {
    let row = db.query_opt(
        "SELECT v.id, v.product_id, v.variant_name, v.sku, v.unit, v.size, v.created_at, \
                p.inventory_id \
         FROM product_variants v JOIN products p ON p.id = v.product_id \
         WHERE v.id = $1 AND v.deleted_at IS NULL AND p.deleted_at IS NULL",
        &[&id],
    )?;
    row.map(|row| -> Result<_, DbError> {
        Ok((ProductVariant::from_row(&row)?, column(&row, "inventory_id")?))
    })
    .transpose()
}

pub fn insert_seller(db: &dyn DbExecutor, name: &str) -> Result<Seller, DbError> {
    fetch_one(
        db,
        "INSERT INTO sellers (name) VALUES ($1) RETURNING id, name, created_at",
        &[&name],
    )
}

pub fn insert_outlet(db: &dyn DbExecutor, seller_id: Uuid, input: &NewOutlet) -> Result<Outlet, DbError> {
    fetch_one(
        db,
        &format!(
            "INSERT INTO outlets (seller_id, name, channel, address, website_url) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {OUTLET_COLUMNS}"
        ),
        &[&seller_id, &input.name, &input.channel.as_str(), &input.address, &input.website_url],
    )
}

pub fn find_outlet(db: &dyn DbExecutor, id: Uuid) -> Result<Option<Outlet>, DbError> {
    fetch_optional(
        db,
        &format!("SELECT {OUTLET_COLUMNS} FROM outlets WHERE id = $1"),
        &[&id],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("milk"), "%milk%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
    }

    #[test]
    fn test_outlet_channel_parses() {
        assert_eq!("online".parse::<OutletChannel>(), Ok(OutletChannel::Online));
        assert_eq!(OutletChannel::default().as_str(), "physical");
        assert!("mail".parse::<OutletChannel>().is_err());
    }
}
