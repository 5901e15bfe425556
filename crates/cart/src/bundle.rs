//! Bundle groups: cart lines bought together under one offer instance.

use serde::{Deserialize, Serialize};
use storefront_core::{BundleGroupId, RecordId};

use crate::item::CartItem;
use crate::pricing;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleGroup {
    pub bundle_group_id: BundleGroupId,
    pub bundle_offer_id: Option<RecordId>,
    pub bundle_offer_name: Option<String>,
    pub bundle_discount: Option<f64>,
    pub items: Vec<CartItem>,
}

impl BundleGroup {
    pub fn subtotal(&self) -> f64 {
        pricing::subtotal(&self.items)
    }
}

/// Group bundled lines by group id, in order of first appearance. Plain
/// lines are skipped.
pub fn group_items<'a>(items: impl IntoIterator<Item = &'a CartItem>) -> Vec<BundleGroup> {
    let mut groups: Vec<BundleGroup> = Vec::new();

    for item in items {
        let Some(group_id) = &item.bundle_group_id else {
            continue;
        };
        match groups.iter_mut().find(|g| &g.bundle_group_id == group_id) {
            Some(group) => group.items.push(item.clone()),
            None => groups.push(BundleGroup {
                bundle_group_id: group_id.clone(),
                bundle_offer_id: item.bundle_offer_id.clone(),
                bundle_offer_name: item.bundle_offer_name.clone(),
                bundle_discount: item.bundle_discount,
                items: vec![item.clone()],
            }),
        }
    }
    groups
}
