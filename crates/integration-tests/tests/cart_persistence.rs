//! Cart rehydration across reloads.

#![allow(clippy::unwrap_used)]

use farmacia_core::{Price, ProductId};
use farmacia_integration_tests::TestContext;
use farmacia_storefront::models::session::keys;
use farmacia_storefront::services::notifications::NotificationLevel;
use farmacia_storefront::storage::KeyValueStore;

#[test]
fn test_cart_accumulates_and_survives_reload() {
    let mut ctx = TestContext::new();
    let pain_reliever = ctx.product(1).unwrap();
    let vitamins = ctx.product(2).unwrap();

    ctx.state.cart().add_to_cart(&pain_reliever, 2).unwrap();
    ctx.state.cart().add_to_cart(&vitamins, 1).unwrap();
    ctx.state.cart().add_to_cart(&pain_reliever, 3).unwrap();

    assert_eq!(ctx.state.cart().quantity_of(ProductId::new(1)), Some(5));
    assert!(ctx.state.cart().is_open());
    let added = ctx.take_notifications();
    assert_eq!(added.len(), 3);
    assert!(added.iter().all(|n| n.level == NotificationLevel::Success));

    let reloaded = ctx.reload();
    let cart = reloaded.state.cart();
    let ids: Vec<i32> = cart.items().iter().map(|i| i.product.id.as_i32()).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(cart.quantity_of(ProductId::new(1)), Some(5));
    assert_eq!(cart.item_count(), 6);
    assert_eq!(cart.subtotal(), Price::from_cents(3549));
    assert!(!cart.is_open());
}

#[test]
fn test_reload_drops_lines_the_catalog_no_longer_lists() {
    let ctx = TestContext::new();
    ctx.store
        .set(
            keys::CART,
            r#"[{"productId":99,"quantity":1},{"productId":3,"quantity":2},{"productId":1,"quantity":0}]"#,
        )
        .unwrap();

    let reloaded = ctx.reload();
    let items = reloaded.state.cart().items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product.id, ProductId::new(3));
    assert_eq!(items[0].quantity, 2);
}

#[test]
fn test_update_and_remove_persist() {
    let ctx = TestContext::new();
    let thermometer = ctx.product(3).unwrap();
    let vitamins = ctx.product(2).unwrap();
    ctx.state.cart().add_to_cart(&thermometer, 1).unwrap();
    ctx.state.cart().add_to_cart(&vitamins, 4).unwrap();

    ctx.state.cart().update_quantity(ProductId::new(2), 2).unwrap();
    ctx.state.cart().update_quantity(ProductId::new(3), 0).unwrap();

    let reloaded = ctx.reload();
    let items = reloaded.state.cart().items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product.id, ProductId::new(2));
    assert_eq!(items[0].quantity, 2);

    reloaded.state.cart().remove_from_cart(ProductId::new(2));
    assert!(reloaded.reload().state.cart().is_empty());
}

#[test]
fn test_summary_applies_promo_and_shipping() {
    let ctx = TestContext::new();
    let vitamins = ctx.product(2).unwrap();
    ctx.state.cart().add_to_cart(&vitamins, 2).unwrap();

    let summary = ctx.state.cart().summary(Some("DISCOUNT10"));
    assert_eq!(summary.subtotal, Price::from_cents(2598));
    assert!(summary.has_discount());
    assert_eq!(summary.shipping, Price::from_cents(599));

    let plain = ctx.state.cart().summary(None);
    assert!(!plain.has_discount());
    assert_eq!(plain.total, Price::from_cents(3197));
}
