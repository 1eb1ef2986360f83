//! Users, inventories, catalog, consumption and shopping lists against a real
//! database.
//!
//! Requires `TEST_DATABASE_URL`; every test is skipped without it.

mod common;

use rust_decimal::Decimal;
use uuid::Uuid;

use pantry::models::{
    stock, ItemTarget, NewCanonicalProduct, NewConsumption, NewOutlet, NewProduct, NewShoppingListItem,
    NewTransactionItem, NewUser, NewVariant,
};
use pantry::services::{CreateTransactionInput, UpdateShoppingListItem};
use pantry::{ErrorKind, PageRequest};

use common::{audit_count, fixture, unique_email};

#[test]
fn test_register_rejects_duplicate_email_ignoring_case() {
    let Some(fx) = fixture() else { return };
    let email = unique_email();
    let first = fx.user_with_email(&email);

    let err = fx
        .pantry
        .users
        .register(
            &fx.conn,
            &NewUser {
                email: email.to_uppercase(),
                name: "Copy".to_string(),
                password_hash: "x".to_string(),
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let found = fx.pantry.users.find_by_email(&fx.conn, &email.to_uppercase()).unwrap();
    assert_eq!(found.map(|u| u.id), Some(first.id));
    assert_eq!(fx.pantry.users.get(&fx.conn, first.id).unwrap().email, email);
}

#[test]
fn test_register_validates_fields() {
    let Some(fx) = fixture() else { return };
    for (email, name) in [("nope", "Ana"), ("ana@example.com", "  ")] {
        let err = fx
            .pantry
            .users
            .register(
                &fx.conn,
                &NewUser {
                    email: email.to_string(),
                    name: name.to_string(),
                    password_hash: "x".to_string(),
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}

#[test]
fn test_inventory_creation_makes_owner_admin() {
    let Some(fx) = fixture() else { return };
    let owner = fx.user();
    let outsider = fx.user();
    let inv = fx.inventory(&owner);

    let members = fx.pantry.membership.list_members(&fx.conn, owner.id, inv.id).unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].role, pantry::models::Role::Admin);
    assert_eq!(audit_count(&fx.conn, "inventory.created", inv.id), 1);

    let listed = fx
        .pantry
        .inventories
        .list_inventories(&fx.conn, owner.id, PageRequest::default())
        .unwrap();
    assert!(listed.iter().any(|i| i.id == inv.id));
    let err = fx.pantry.inventories.get_inventory(&fx.conn, outsider.id, inv.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let blank = fx.pantry.inventories.create_inventory(&fx.conn, owner.id, " ");
    assert_eq!(blank.unwrap_err().kind(), ErrorKind::InvalidInput);
}

#[test]
fn test_catalog_is_inventory_scoped() {
    let Some(fx) = fixture() else { return };
    let a = fx.user();
    let outsider = fx.user();
    let inv = fx.inventory(&a);
    let other = fx.inventory(&a);

    let milk = fx
        .pantry
        .catalog
        .create_canonical_product(
            &fx.conn,
            a.id,
            inv.id,
            &NewCanonicalProduct {
                name: "Milk".to_string(),
                category: Some("dairy".to_string()),
                ..NewCanonicalProduct::default()
            },
        )
        .unwrap();
    assert_eq!(audit_count(&fx.conn, "canonical_product.created", milk.id), 1);

    let cross = fx.pantry.catalog.create_product(
        &fx.conn,
        a.id,
        other.id,
        &NewProduct {
            name: "Oat milk".to_string(),
            canonical_product_id: Some(milk.id),
            ..NewProduct::default()
        },
    );
    assert_eq!(cross.unwrap_err().kind(), ErrorKind::NotFound);

    let product = fx
        .pantry
        .catalog
        .create_product(
            &fx.conn,
            a.id,
            inv.id,
            &NewProduct {
                name: "Semi-skimmed".to_string(),
                brand: Some("Dairy Co".to_string()),
                canonical_product_id: Some(milk.id),
                ..NewProduct::default()
            },
        )
        .unwrap();

    let search = fx
        .pantry
        .catalog
        .list_products(&fx.conn, a.id, inv.id, Some("dairy"), PageRequest::default())
        .unwrap();
    assert_eq!(search.iter().map(|p| p.id).collect::<Vec<_>>(), vec![product.id]);
    let canonical = fx
        .pantry
        .catalog
        .list_canonical_products(&fx.conn, a.id, inv.id, Some("MIL"), PageRequest::default())
        .unwrap();
    assert_eq!(canonical.len(), 1);

    let zero_size = fx.pantry.catalog.create_variant(
        &fx.conn,
        a.id,
        product.id,
        &NewVariant {
            variant_name: "Empty".to_string(),
            size: Some(0.0),
            ..NewVariant::default()
        },
    );
    assert_eq!(zero_size.unwrap_err().kind(), ErrorKind::InvalidInput);

    let outsider_variant = fx.pantry.catalog.create_variant(
        &fx.conn,
        outsider.id,
        product.id,
        &NewVariant {
            variant_name: "1L".to_string(),
            ..NewVariant::default()
        },
    );
    assert_eq!(outsider_variant.unwrap_err().kind(), ErrorKind::NotFound);

    let variant = fx
        .pantry
        .catalog
        .create_variant(
            &fx.conn,
            a.id,
            product.id,
            &NewVariant {
                variant_name: "1L".to_string(),
                unit: Some("L".to_string()),
                size: Some(1.0),
                ..NewVariant::default()
            },
        )
        .unwrap();
    assert_eq!(fx.pantry.catalog.get_variant(&fx.conn, a.id, variant.id).unwrap(), variant);
    assert_eq!(
        fx.pantry.catalog.list_variants(&fx.conn, a.id, product.id).unwrap(),
        vec![variant.clone()]
    );
    let hidden = fx.pantry.catalog.get_variant(&fx.conn, outsider.id, variant.id);
    assert_eq!(hidden.unwrap_err().kind(), ErrorKind::NotFound);
    let hidden = fx.pantry.catalog.get_canonical_product(&fx.conn, outsider.id, milk.id);
    assert_eq!(hidden.unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn test_product_update_and_soft_delete() {
    let Some(fx) = fixture() else { return };
    let a = fx.user();
    let outsider = fx.user();
    let inv = fx.inventory(&a);
    let other = fx.inventory(&a);

    let bread = fx
        .pantry
        .catalog
        .create_canonical_product(
            &fx.conn,
            a.id,
            inv.id,
            &NewCanonicalProduct {
                name: "Bread".to_string(),
                ..NewCanonicalProduct::default()
            },
        )
        .unwrap();
    let renamed = fx
        .pantry
        .catalog
        .update_canonical_product(
            &fx.conn,
            a.id,
            bread.id,
            &NewCanonicalProduct {
                name: "Sourdough".to_string(),
                category: Some("bakery".to_string()),
                ..NewCanonicalProduct::default()
            },
        )
        .unwrap();
    assert_eq!(renamed.name, "Sourdough");
    assert_eq!(renamed.category.as_deref(), Some("bakery"));
    assert!(renamed.updated_at >= bread.updated_at);
    assert_eq!(audit_count(&fx.conn, "canonical_product.updated", bread.id), 1);

    let blank = fx.pantry.catalog.update_canonical_product(
        &fx.conn,
        a.id,
        bread.id,
        &NewCanonicalProduct::default(),
    );
    assert_eq!(blank.unwrap_err().kind(), ErrorKind::InvalidInput);
    let hidden = fx.pantry.catalog.update_canonical_product(
        &fx.conn,
        outsider.id,
        bread.id,
        &NewCanonicalProduct {
            name: "Rye".to_string(),
            ..NewCanonicalProduct::default()
        },
    );
    assert_eq!(hidden.unwrap_err().kind(), ErrorKind::NotFound);

    let loaf = fx
        .pantry
        .catalog
        .create_product(
            &fx.conn,
            a.id,
            inv.id,
            &NewProduct {
                name: "Country loaf".to_string(),
                ..NewProduct::default()
            },
        )
        .unwrap();
    let linked = fx
        .pantry
        .catalog
        .update_product(
            &fx.conn,
            a.id,
            loaf.id,
            &NewProduct {
                name: "Country loaf 800g".to_string(),
                brand: Some("Village Bakery".to_string()),
                canonical_product_id: Some(bread.id),
                ..NewProduct::default()
            },
        )
        .unwrap();
    assert_eq!(linked.canonical_product_id, Some(bread.id));
    assert_eq!(linked.brand.as_deref(), Some("Village Bakery"));
    assert_eq!(audit_count(&fx.conn, "product.updated", loaf.id), 1);

    let foreign = fx
        .pantry
        .catalog
        .create_canonical_product(
            &fx.conn,
            a.id,
            other.id,
            &NewCanonicalProduct {
                name: "Bread".to_string(),
                ..NewCanonicalProduct::default()
            },
        )
        .unwrap();
    let cross = fx.pantry.catalog.update_product(
        &fx.conn,
        a.id,
        loaf.id,
        &NewProduct {
            name: "Country loaf".to_string(),
            canonical_product_id: Some(foreign.id),
            ..NewProduct::default()
        },
    );
    assert_eq!(cross.unwrap_err().kind(), ErrorKind::NotFound);

    let by_outsider = fx.pantry.catalog.delete_product(&fx.conn, outsider.id, loaf.id);
    assert_eq!(by_outsider.unwrap_err().kind(), ErrorKind::NotFound);
    fx.pantry.catalog.delete_product(&fx.conn, a.id, loaf.id).unwrap();
    assert_eq!(audit_count(&fx.conn, "product.deleted", loaf.id), 1);
    let gone = fx.pantry.catalog.get_product(&fx.conn, a.id, loaf.id);
    assert_eq!(gone.unwrap_err().kind(), ErrorKind::NotFound);
    let twice = fx.pantry.catalog.delete_product(&fx.conn, a.id, loaf.id);
    assert_eq!(twice.unwrap_err().kind(), ErrorKind::NotFound);
    let listed = fx
        .pantry
        .catalog
        .list_products(&fx.conn, a.id, inv.id, None, PageRequest::default())
        .unwrap();
    assert!(listed.iter().all(|p| p.id != loaf.id));

    fx.pantry.catalog.delete_canonical_product(&fx.conn, a.id, bread.id).unwrap();
    assert_eq!(audit_count(&fx.conn, "canonical_product.deleted", bread.id), 1);
    let gone = fx.pantry.catalog.get_canonical_product(&fx.conn, a.id, bread.id);
    assert_eq!(gone.unwrap_err().kind(), ErrorKind::NotFound);
    let relink = fx.pantry.catalog.create_product(
        &fx.conn,
        a.id,
        inv.id,
        &NewProduct {
            name: "Bloomer".to_string(),
            canonical_product_id: Some(bread.id),
            ..NewProduct::default()
        },
    );
    assert_eq!(relink.unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn test_outlet_requires_known_seller() {
    let Some(fx) = fixture() else { return };
    let err = fx
        .pantry
        .catalog
        .create_outlet(
            &fx.conn,
            Uuid::new_v4(),
            &pantry::models::NewOutlet {
                name: "Nowhere".to_string(),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let missing = fx.pantry.catalog.get_outlet(&fx.conn, Uuid::new_v4());
    assert_eq!(missing.unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn test_consumption_leaves_stock_unchanged() {
    let Some(fx) = fixture() else { return };
    let a = fx.user();
    let inv = fx.inventory(&a);
    let variant = fx.variant(&a, &inv, Some(1.0), Some("L"));
    let input = CreateTransactionInput::new(
        inv.id,
        vec![NewTransactionItem::new(variant.id, 2.0).priced(Decimal::new(1, 0))],
    );
    fx.pantry.transactions.create_transaction(&fx.conn, a.id, &input).unwrap();

    let event = fx
        .pantry
        .consumption
        .record_consumption(
            &fx.conn,
            a.id,
            &NewConsumption {
                inventory_id: inv.id,
                quantity: Some(1.0),
                unit: Some("L".to_string()),
                ..NewConsumption::default()
            },
        )
        .unwrap();
    assert_eq!(event.source, "manual");
    assert_eq!(audit_count(&fx.conn, "consumption.created", event.id), 1);

    let row = stock::find(&fx.conn, inv.id, variant.id).unwrap().expect("stock row");
    assert_eq!(row.quantity, 2.0);

    let listed = fx
        .pantry
        .consumption
        .list_consumption(&fx.conn, a.id, inv.id, PageRequest::default())
        .unwrap();
    assert_eq!(listed.iter().map(|e| e.id).collect::<Vec<_>>(), vec![event.id]);
}

#[test]
fn test_consumption_validation() {
    let Some(fx) = fixture() else { return };
    let a = fx.user();
    let outsider = fx.user();
    let inv = fx.inventory(&a);

    let negative = NewConsumption {
        inventory_id: inv.id,
        quantity: Some(-1.0),
        ..NewConsumption::default()
    };
    let err = fx.pantry.consumption.record_consumption(&fx.conn, a.id, &negative).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let unknown_product = NewConsumption {
        inventory_id: inv.id,
        canonical_product_id: Some(Uuid::new_v4()),
        ..NewConsumption::default()
    };
    let err = fx
        .pantry
        .consumption
        .record_consumption(&fx.conn, a.id, &unknown_product)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let foreign = NewConsumption {
        inventory_id: inv.id,
        source: Some("scanner".to_string()),
        ..NewConsumption::default()
    };
    let err = fx
        .pantry
        .consumption
        .record_consumption(&fx.conn, outsider.id, &foreign)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[test]
fn test_shopping_list_lifecycle() {
    let Some(fx) = fixture() else { return };
    let a = fx.user();
    let outsider = fx.user();
    let inv = fx.inventory(&a);
    let variant = fx.variant(&a, &inv, None, None);

    let list = fx.pantry.shopping_lists.create_list(&fx.conn, a.id, inv.id, "Weekly").unwrap();
    assert_eq!(audit_count(&fx.conn, "shopping_list.created", list.id), 1);

    let foreign = fx.pantry.shopping_lists.create_list(&fx.conn, outsider.id, inv.id, "Mine");
    assert_eq!(foreign.unwrap_err().kind(), ErrorKind::Unauthorized);
    let peek = fx.pantry.shopping_lists.get_list(&fx.conn, outsider.id, list.id);
    assert_eq!(peek.unwrap_err().kind(), ErrorKind::NotFound);

    let renamed = fx
        .pantry
        .shopping_lists
        .rename_list(&fx.conn, a.id, list.id, "Saturday")
        .unwrap();
    assert_eq!(renamed.name, "Saturday");
    assert!(renamed.last_updated_at >= list.last_updated_at);

    let item = fx
        .pantry
        .shopping_lists
        .add_item(&fx.conn, a.id, list.id, &NewShoppingListItem::new(ItemTarget::ProductVariant(variant.id)))
        .unwrap();
    assert_eq!(item.target, ItemTarget::ProductVariant(variant.id));

    let unknown = fx.pantry.shopping_lists.add_item(
        &fx.conn,
        a.id,
        list.id,
        &NewShoppingListItem::new(ItemTarget::CanonicalProduct(Uuid::new_v4())),
    );
    assert_eq!(unknown.unwrap_err().kind(), ErrorKind::NotFound);

    let seller = fx.pantry.catalog.create_seller(&fx.conn, "Market Hall").unwrap();
    let outlet = fx
        .pantry
        .catalog
        .create_outlet(
            &fx.conn,
            seller.id,
            &NewOutlet {
                name: "Stall 4".to_string(),
                ..NewOutlet::default()
            },
        )
        .unwrap();
    let with_outlet = fx
        .pantry
        .shopping_lists
        .update_item(
            &fx.conn,
            a.id,
            list.id,
            item.id,
            &UpdateShoppingListItem {
                notes: Some("any size".to_string()),
                preferred_outlet_id: Some(outlet.id),
            },
        )
        .unwrap();
    assert_eq!(with_outlet.preferred_outlet_id, Some(outlet.id));

    // Only the notes change; the preferred outlet stays.
    let updated = fx
        .pantry
        .shopping_lists
        .update_item(
            &fx.conn,
            a.id,
            list.id,
            item.id,
            &UpdateShoppingListItem {
                notes: Some("the big one".to_string()),
                preferred_outlet_id: None,
            },
        )
        .unwrap();
    assert_eq!(updated.notes.as_deref(), Some("the big one"));
    assert_eq!(updated.preferred_outlet_id, Some(outlet.id));
    let listed = fx.pantry.shopping_lists.list_items(&fx.conn, a.id, list.id).unwrap();
    assert_eq!(listed[0].preferred_outlet_id, Some(outlet.id));

    fx.pantry.shopping_lists.delete_item(&fx.conn, a.id, list.id, item.id).unwrap();
    assert!(fx.pantry.shopping_lists.list_items(&fx.conn, a.id, list.id).unwrap().is_empty());
    let again = fx.pantry.shopping_lists.delete_item(&fx.conn, a.id, list.id, item.id);
    assert_eq!(again.unwrap_err().kind(), ErrorKind::NotFound);

    fx.pantry.shopping_lists.delete_list(&fx.conn, a.id, list.id).unwrap();
    let gone = fx.pantry.shopping_lists.get_list(&fx.conn, a.id, list.id);
    assert_eq!(gone.unwrap_err().kind(), ErrorKind::NotFound);
    let lists = fx
        .pantry
        .shopping_lists
        .list_lists(&fx.conn, a.id, inv.id, PageRequest::default())
        .unwrap();
    assert!(lists.is_empty());
    assert_eq!(audit_count(&fx.conn, "shopping_list.deleted", list.id), 1);
}
