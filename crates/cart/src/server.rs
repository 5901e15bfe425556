//! Mapping of the authoritative server cart into local lines.

use chrono::{DateTime, Utc};
use storefront_catalog::ProductSnapshot;
use storefront_remote::{ServerCart, ServerCartItem};

use crate::item::CartItem;
use crate::state::CartState;

/// Local line for one server line; `None` for non-positive quantities.
pub fn item_from_server(line: ServerCartItem, now: DateTime<Utc>) -> Option<CartItem> {
    let quantity = u32::try_from(line.quantity).ok().filter(|q| *q > 0)?;

    let mut product = line
        .product
        .and_then(|value| match serde_json::from_value::<ProductSnapshot>(value) {
            Ok(product) => Some(product),
            Err(err) => {
                tracing::warn!(product_id = %line.product_id, error = %err, "server cart product has unexpected shape");
                None
            }
        })
        .unwrap_or_else(|| ProductSnapshot::bare(line.product_id.clone()));
    if product.price.is_none() {
        product.price = line.original_unit_price;
    }

    let mut item = CartItem::new(product, quantity, now);
    item.product_id = line.product_id;
    item.original_price = line.original_unit_price.or(item.original_price);
    item.discounted_price = line.final_unit_price;
    item.bundle_group_id = line.bundle_group_id;

    if line.discount_details.is_bundle() {
        item.bundle_offer_id = line.discount_details.discount_source_id;
        item.bundle_offer_name = line.discount_details.discount_source_name;
        item.bundle_discount = Some(line.discount_details.discount_value);
    }
    Some(item)
}

/// All lines of a server cart, merged by `(product_id, bundle_group_id)`.
pub fn items_from_server(cart: ServerCart, now: DateTime<Utc>) -> Vec<CartItem> {
    let mut state = CartState::default();
    for line in cart.items {
        if let Some(item) = item_from_server(line, now) {
            state.merge_item(item, now);
        }
    }
    state.items
}
