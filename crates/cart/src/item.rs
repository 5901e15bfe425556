//! Cart line.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storefront_catalog::ProductSnapshot;
use storefront_core::{BundleGroupId, RecordId};
use storefront_remote::CartAddBody;

/// One line of the local cart.
///
/// Unique within a cart by `(product_id, bundle_group_id)`: the same product
/// may appear once plain and once per bundle instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: RecordId,
    pub quantity: u32,
    pub product: ProductSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_group_id: Option<BundleGroupId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_offer_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_offer_name: Option<String>,
    /// Bundle discount percentage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_discount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discounted_price: Option<f64>,
    #[serde(default = "first_version")]
    pub version: u32,
    pub local_modified_at: DateTime<Utc>,
}

fn first_version() -> u32 {
    1
}

impl CartItem {
    /// Plain (non-bundle) line for `product`.
    pub fn new(product: ProductSnapshot, quantity: u32, now: DateTime<Utc>) -> Self {
        Self {
            product_id: product.id.clone(),
            quantity,
            original_price: product.price,
            product,
            bundle_group_id: None,
            bundle_offer_id: None,
            bundle_offer_name: None,
            bundle_discount: None,
            discounted_price: None,
            version: first_version(),
            local_modified_at: now,
        }
    }

    pub fn matches(&self, product_id: &RecordId, bundle_group_id: Option<&BundleGroupId>) -> bool {
        &self.product_id == product_id && self.bundle_group_id.as_ref() == bundle_group_id
    }

    pub fn is_bundled(&self) -> bool {
        self.bundle_group_id.is_some()
    }

    /// Bump the version and stamp a local modification.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.version = self.version.saturating_add(1);
        self.local_modified_at = now;
    }

    /// Drop bundle membership and fall back to the undiscounted price.
    pub fn void_bundle(&mut self, now: DateTime<Utc>) {
        self.discounted_price = self.original_price.or(self.product.price);
        self.bundle_group_id = None;
        self.bundle_offer_id = None;
        self.bundle_offer_name = None;
        self.bundle_discount = None;
        self.touch(now);
    }

    /// Body that mirrors adding `quantity` of this line to the remote cart.
    pub fn add_body(&self, quantity: u32) -> CartAddBody {
        CartAddBody {
            product_id: self.product_id.clone(),
            quantity,
            bundle_group_id: self.bundle_group_id.clone(),
            bundle_offer_id: self.bundle_offer_id.clone(),
            bundle_discount_percentage: self.bundle_discount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn void_resets_to_original_price() {
        let now = Utc::now();
        let mut item = CartItem::new(ProductSnapshot::new("b", "B", Some(50.0)), 1, now);
        item.bundle_group_id = Some("g1".into());
        item.bundle_offer_id = Some("bundle_1".into());
        item.bundle_discount = Some(10.0);
        item.discounted_price = Some(45.0);

        item.void_bundle(now);
        assert_eq!(item.discounted_price, Some(50.0));
        assert!(!item.is_bundled());
        assert!(item.bundle_offer_id.is_none());
        assert!(item.bundle_discount.is_none());
        assert_eq!(item.version, 2);
    }

    #[test]
    fn void_falls_back_to_catalog_price() {
        let now = Utc::now();
        let mut item = CartItem::new(ProductSnapshot::new("b", "B", Some(80.0)), 1, now);
        item.original_price = None;
        item.discounted_price = Some(60.0);
        item.void_bundle(now);
        assert_eq!(item.discounted_price, Some(80.0));
    }

    #[test]
    fn plain_line_serializes_without_bundle_fields() {
        let item = CartItem::new(ProductSnapshot::new("p1", "Filter", Some(5.0)), 2, Utc::now());
        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("bundle_group_id").is_none());
        assert_eq!(json["quantity"], json!(2));
        assert_eq!(json["version"], json!(1));
    }
}
