//! Cart price math.
//!
//! Money is kept as `f64` and rounded to cents at the edges.

use serde::{Deserialize, Serialize};

use crate::item::CartItem;

/// Round to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Unit price used in subtotal math.
///
/// Precedence:
/// 1. `discounted_price`
/// 2. `product.price`
/// 3. `0`
pub fn resolve_unit_price(item: &CartItem) -> f64 {
    item.discounted_price.or(item.product.price).unwrap_or(0.0)
}

/// Undiscounted unit price: `original_price`, then `product.price`, then `0`.
pub fn original_unit_price(item: &CartItem) -> f64 {
    item.original_price.or(item.product.price).unwrap_or(0.0)
}

/// `original × (1 − percentage / 100)`, rounded to cents.
pub fn discounted_unit_price(original: f64, percentage: f64) -> f64 {
    round2(original * (1.0 - percentage / 100.0))
}

/// Cart totals as the server computes them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CartTotals {
    /// Σ quantity × undiscounted price.
    pub subtotal: f64,
    pub total_discount: f64,
    /// Σ quantity × resolved price.
    pub total: f64,
}

impl CartTotals {
    pub fn of<'a>(items: impl IntoIterator<Item = &'a CartItem>) -> Self {
        let (subtotal, total) = items.into_iter().fold((0.0, 0.0), |(sub, tot), item| {
            let qty = f64::from(item.quantity);
            (
                sub + original_unit_price(item) * qty,
                tot + resolve_unit_price(item) * qty,
            )
        });

        Self {
            subtotal: round2(subtotal),
            total_discount: round2(subtotal - total),
            total: round2(total),
        }
    }
}

/// Σ over items of `quantity × resolve_unit_price`.
pub fn subtotal<'a>(items: impl IntoIterator<Item = &'a CartItem>) -> f64 {
    round2(
        items
            .into_iter()
            .map(|item| resolve_unit_price(item) * f64::from(item.quantity))
            .sum(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use storefront_catalog::ProductSnapshot;

    fn item(price: Option<f64>, discounted: Option<f64>, quantity: u32) -> CartItem {
        let mut item = CartItem::new(ProductSnapshot::new("p", "P", price), quantity, Utc::now());
        item.discounted_price = discounted;
        item
    }

    #[test]
    fn discounted_price_wins_over_catalog_price() {
        assert_eq!(resolve_unit_price(&item(Some(50.0), Some(45.0), 1)), 45.0);
        assert_eq!(resolve_unit_price(&item(Some(50.0), None, 1)), 50.0);
        assert_eq!(resolve_unit_price(&item(None, None, 1)), 0.0);
    }

    #[test]
    fn discount_math_rounds_to_cents() {
        assert_eq!(discounted_unit_price(50.0, 10.0), 45.0);
        assert_eq!(discounted_unit_price(19.99, 15.0), 16.99);
        assert_eq!(discounted_unit_price(30.0, 0.0), 30.0);
        assert_eq!(discounted_unit_price(30.0, 100.0), 0.0);
    }

    #[test]
    fn totals_split_discount_from_subtotal() {
        let items = vec![item(Some(50.0), Some(45.0), 2), item(Some(10.0), None, 1)];
        let totals = CartTotals::of(&items);
        assert_eq!(totals.subtotal, 110.0);
        assert_eq!(totals.total_discount, 10.0);
        assert_eq!(totals.total, 100.0);
        assert_eq!(subtotal(&items), 100.0);
    }
}
