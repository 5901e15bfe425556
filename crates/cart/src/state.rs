//! Local cart state and its synchronous transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storefront_core::{BundleGroupId, RecordId};

use crate::item::CartItem;

/// Copy of the cart lines taken before a risky operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<CartItem>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartState {
    pub items: Vec<CartItem>,
    pub is_loading: bool,
    pub last_error: Option<String>,
    pub last_snapshot: Option<CartSnapshot>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl CartState {
    pub fn new(items: Vec<CartItem>, last_snapshot: Option<CartSnapshot>) -> Self {
        Self {
            items,
            last_snapshot,
            ..Self::default()
        }
    }

    pub fn position(&self, product_id: &RecordId, bundle_group_id: Option<&BundleGroupId>) -> Option<usize> {
        self.items
            .iter()
            .position(|i| i.matches(product_id, bundle_group_id))
    }

    /// First line holding `product_id`, plain or bundled.
    pub fn first_for_product(&self, product_id: &RecordId) -> Option<&CartItem> {
        self.items.iter().find(|i| &i.product_id == product_id)
    }

    /// Add a line, or accumulate its quantity into the existing line with the
    /// same `(product_id, bundle_group_id)`.
    pub fn merge_item(&mut self, mut item: CartItem, now: DateTime<Utc>) {
        match self.position(&item.product_id, item.bundle_group_id.as_ref()) {
            Some(pos) => {
                let existing = &mut self.items[pos];
                existing.quantity = existing.quantity.saturating_add(item.quantity);
                existing.touch(now);
            }
            None => {
                item.version = 1;
                item.local_modified_at = now;
                self.items.push(item);
            }
        }
    }

    /// Void every line of `group` in one step. Returns how many lines were voided.
    ///
    /// A voided line that collides with an existing plain line of the same
    /// product is folded into it.
    pub fn void_group(&mut self, group: &BundleGroupId, now: DateTime<Utc>) -> usize {
        let mut voided = 0;
        let mut folded = Vec::new();

        for pos in 0..self.items.len() {
            if self.items[pos].bundle_group_id.as_ref() != Some(group) {
                continue;
            }
            self.items[pos].void_bundle(now);
            voided += 1;

            let product_id = self.items[pos].product_id.clone();
            let plain = self
                .items
                .iter()
                .enumerate()
                .position(|(other, i)| other != pos && !folded.contains(&other) && i.matches(&product_id, None));
            if let Some(target) = plain {
                let quantity = self.items[pos].quantity;
                let line = &mut self.items[target];
                line.quantity = line.quantity.saturating_add(quantity);
                line.touch(now);
                folded.push(pos);
            }
        }

        if !folded.is_empty() {
            let mut pos = 0;
            self.items.retain(|_| {
                let keep = !folded.contains(&pos);
                pos += 1;
                keep
            });
        }
        voided
    }

    /// Remove one line. Returns it if it existed.
    pub fn remove_line(
        &mut self,
        product_id: &RecordId,
        bundle_group_id: Option<&BundleGroupId>,
    ) -> Option<CartItem> {
        let pos = self.position(product_id, bundle_group_id)?;
        Some(self.items.remove(pos))
    }

    pub fn take_snapshot(&mut self, now: DateTime<Utc>) {
        self.last_snapshot = Some(CartSnapshot {
            timestamp: now,
            items: self.items.clone(),
        });
    }

    /// Put the snapshotted lines back. Returns `false` if there is no snapshot.
    pub fn restore_snapshot(&mut self) -> bool {
        match &self.last_snapshot {
            Some(snapshot) => {
                self.items = snapshot.items.clone();
                true
            }
            None => false,
        }
    }

    /// Σ quantity over all lines.
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }
}
