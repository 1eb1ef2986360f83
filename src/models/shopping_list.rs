use chrono::{DateTime, Utc};
use may_postgres::Row;
use serde::Serialize;
use uuid::Uuid;

use crate::executor::{DbError, DbExecutor};
use crate::pool::config::Page;
use crate::raw_sql::{column, exists, fetch_all, fetch_one, fetch_optional, FromRow};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShoppingList {
    pub id: Uuid,
    pub inventory_id: Uuid,
    pub name: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl FromRow for ShoppingList {
    fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: column(row, "id")?,
            inventory_id: column(row, "inventory_id")?,
            name: column(row, "name")?,
            created_by: column(row, "created_by")?,
            created_at: column(row, "created_at")?,
            last_updated_at: column(row, "last_updated_at")?,
        })
    }
}

/// What a list entry asks for: any variant of a generic product, or one exact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ItemTarget {
    CanonicalProduct(Uuid),
    ProductVariant(Uuid),
}

impl ItemTarget {
    fn from_columns(canonical: Option<Uuid>, variant: Option<Uuid>) -> Result<Self, DbError> {
        match (canonical, variant) {
            (Some(id), None) => Ok(Self::CanonicalProduct(id)),
            (None, Some(id)) => Ok(Self::ProductVariant(id)),
            _ => Err(DbError::ParseError(
                "shopping list item must reference exactly one product".to_string(),
            )),
        }
    }

    fn canonical_product_id(&self) -> Option<Uuid> {
        match self {
            Self::CanonicalProduct(id) => Some(*id),
            Self::ProductVariant(_) => None,
        }
    }

    fn product_variant_id(&self) -> Option<Uuid> {
        match self {
            Self::ProductVariant(id) => Some(*id),
            Self::CanonicalProduct(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShoppingListItem {
    pub id: Uuid,
    pub shopping_list_id: Uuid,
    pub target: ItemTarget,
    pub preferred_outlet_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FromRow for ShoppingListItem {
    fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: column(row, "id")?,
            shopping_list_id: column(row, "shopping_list_id")?,
            target: ItemTarget::from_columns(
                column(row, "canonical_product_id")?,
                column(row, "product_variant_id")?,
            )?,
            preferred_outlet_id: column(row, "preferred_outlet_id")?,
            notes: column(row, "notes")?,
            created_at: column(row, "created_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewShoppingListItem {
    pub target: ItemTarget,
    pub preferred_outlet_id: Option<Uuid>,
    pub notes: Option<String>,
}

impl NewShoppingListItem {
    pub fn new(target: ItemTarget) -> Self {
        Self {
            target,
            preferred_outlet_id: None,
            notes: None,
        }
    }
}

const COLUMNS: &str = "id, inventory_id, name, created_by, created_at, last_updated_at";
const ITEM_COLUMNS: &str =
    "id, shopping_list_id, canonical_product_id, product_variant_id, preferred_outlet_id, notes, created_at";

pub fn insert(
    db: &dyn DbExecutor,
    inventory_id: Uuid,
    name: &str,
    created_by: Uuid,
) -> Result<ShoppingList, DbError> {
    fetch_one(
        db,
        &format!(
            "INSERT INTO shopping_lists (inventory_id, name, created_by) VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        ),
        &[&inventory_id, &name, &created_by],
    )
}

pub fn find_live(db: &dyn DbExecutor, id: Uuid) -> Result<Option<ShoppingList>, DbError> {
    fetch_optional(
        db,
        &format!("SELECT {COLUMNS} FROM shopping_lists WHERE id = $1 AND deleted_at IS NULL"),
        &[&id],
    )
}

/// Most recently touched first
pub fn list_for_inventory(
    db: &dyn DbExecutor,
    inventory_id: Uuid,
    page: Page,
) -> Result<Vec<ShoppingList>, DbError> {
    fetch_all(
        db,
        &format!(
            "SELECT {COLUMNS} FROM shopping_lists WHERE inventory_id = $1 AND deleted_at IS NULL \
             ORDER BY last_updated_at DESC, id ASC LIMIT $2 OFFSET $3"
        ),
        &[&inventory_id, &page.limit, &page.offset],
    )
}

pub fn rename(db: &dyn DbExecutor, id: Uuid, name: &str) -> Result<Option<ShoppingList>, DbError> {
    fetch_optional(
        db,
        &format!(
            "UPDATE shopping_lists SET name = $2, last_updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {COLUMNS}"
        ),
        &[&id, &name],
    )
}

/// Bump the list's modification time after its items change
pub fn touch(db: &dyn DbExecutor, id: Uuid) -> Result<u64, DbError> {
    db.execute(
        "UPDATE shopping_lists SET last_updated_at = now() WHERE id = $1",
        &[&id],
    )
}

/// Soft delete. Returns false if the list was already gone.
pub fn soft_delete(db: &dyn DbExecutor, id: Uuid) -> Result<bool, DbError> {
    let updated = db.execute(
        "UPDATE shopping_lists SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL",
        &[&id],
    )?;
    Ok(updated > 0)
}

pub fn insert_item(
    db: &dyn DbExecutor,
    shopping_list_id: Uuid,
    input: &NewShoppingListItem,
) -> Result<ShoppingListItem, DbError> {
    fetch_one(
        db,
        &format!(
            "INSERT INTO shopping_list_items \
             (shopping_list_id, canonical_product_id, product_variant_id, preferred_outlet_id, notes) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {ITEM_COLUMNS}"
        ),
        &[
            &shopping_list_id,
            &input.target.canonical_product_id(),
            &input.target.product_variant_id(),
            &input.preferred_outlet_id,
            &input.notes,
        ],
    )
}

pub fn list_items(db: &dyn DbExecutor, shopping_list_id: Uuid) -> Result<Vec<ShoppingListItem>, DbError> {
    fetch_all(
        db,
        &format!(
            "SELECT {ITEM_COLUMNS} FROM shopping_list_items \
             WHERE shopping_list_id = $1 AND deleted_at IS NULL ORDER BY created_at ASC, id ASC"
        ),
        &[&shopping_list_id],
    )
}

/// Change an item's notes and preferred outlet; `None` keeps the stored value.
pub fn update_item(
    db: &dyn DbExecutor,
    shopping_list_id: Uuid,
    item_id: Uuid,
    notes: Option<&str>,
    preferred_outlet_id: Option<Uuid>,
) -> Result<Option<ShoppingListItem>, DbError> {
    fetch_optional(
        db,
        &format!(
            "UPDATE shopping_list_items \
             SET notes = COALESCE($3::TEXT, notes), \
                 preferred_outlet_id = COALESCE($4::UUID, preferred_outlet_id) \
             WHERE id = $1 AND shopping_list_id = $2 AND deleted_at IS NULL RETURNING {ITEM_COLUMNS}"
        ),
        &[&item_id, &shopping_list_id, &notes, &preferred_outlet_id],
    )
}

/// Soft delete one item of a list. Returns false if nothing matched.
pub fn soft_delete_item(db: &dyn DbExecutor, shopping_list_id: Uuid, item_id: Uuid) -> Result<bool, DbError> {
    let updated = db.execute(
        "UPDATE shopping_list_items SET deleted_at = now() \
         WHERE id = $1 AND shopping_list_id = $2 AND deleted_at IS NULL",
        &[&item_id, &shopping_list_id],
    )?;
    Ok(updated > 0)
}

/// Whether a live list item belongs to a live list of this inventory
pub fn item_in_inventory(db: &dyn DbExecutor, item_id: Uuid, inventory_id: Uuid) -> Result<bool, DbError> {
    exists(
        db,
        "SELECT 1 FROM shopping_list_items i JOIN shopping_lists l ON l.id = i.shopping_list_id \
         WHERE i.id = $1 AND l.inventory_id = $2 AND i.deleted_at IS NULL AND l.deleted_at IS NULL",
        &[&item_id, &inventory_id],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_requires_exactly_one_reference() {
        let id = Uuid::new_v4();
        assert_eq!(
            ItemTarget::from_columns(Some(id), None).ok(),
            Some(ItemTarget::CanonicalProduct(id))
        );
        assert_eq!(
            ItemTarget::from_columns(None, Some(id)).ok(),
            Some(ItemTarget::ProductVariant(id))
        );
        assert!(ItemTarget::from_columns(None, None).is_err());
        assert!(ItemTarget::from_columns(Some(id), Some(id)).is_err());
    }

    #[test]
    fn test_target_splits_into_columns() {
        let id = Uuid::new_v4();
        let target = ItemTarget::ProductVariant(id);
        assert_eq!(target.product_variant_id(), Some(id));
        assert_eq!(target.canonical_product_id(), None);
    }

    #[test]
    fn test_target_serializes_tagged() {
        let id = Uuid::nil();
        let json = serde_json::to_value(ItemTarget::CanonicalProduct(id)).unwrap();
        assert_eq!(json["kind"], "canonical_product");
        assert_eq!(json["id"], id.to_string());
    }
}
