//! Bounded rollback points over the tracked collections.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storefront_catalog::{Record, ResourceType};
use storefront_core::SnapshotId;

use crate::entity_cache::EntityCache;

/// Point-in-time copy of the tracked collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSnapshot {
    pub id: SnapshotId,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    /// Only the collections captured at snapshot time.
    #[serde(default)]
    pub data: BTreeMap<ResourceType, Vec<Record>>,
}

/// Newest-first list of snapshots, never longer than `max_snapshots`.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotManager {
    snapshots: Vec<DataSnapshot>,
    max_snapshots: usize,
}

impl SnapshotManager {
    pub const DEFAULT_MAX_SNAPSHOTS: usize = 5;

    pub fn new(max_snapshots: usize) -> Self {
        Self {
            snapshots: Vec::new(),
            max_snapshots,
        }
    }

    /// Rehydrate from persisted snapshots (assumed newest-first).
    pub fn with_snapshots(mut snapshots: Vec<DataSnapshot>, max_snapshots: usize) -> Self {
        snapshots.truncate(max_snapshots);
        Self {
            snapshots,
            max_snapshots,
        }
    }

    /// Deep-copy the tracked collections and prepend the copy.
    pub fn create_snapshot(
        &mut self,
        cache: &EntityCache,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> SnapshotId {
        let data = ResourceType::SNAPSHOT_TRACKED
            .iter()
            .map(|t| (*t, cache.items(*t).to_vec()))
            .collect();

        let snapshot = DataSnapshot {
            id: SnapshotId::new(),
            timestamp: now,
            description: description.into(),
            data,
        };
        let id = snapshot.id;
        tracing::debug!(snapshot_id = %id, description = %snapshot.description, "created snapshot");

        self.snapshots.insert(0, snapshot);
        self.snapshots.truncate(self.max_snapshots);
        id
    }

    /// Overwrite the collections captured by snapshot `id`.
    ///
    /// Collections the snapshot did not capture are left alone. Returns
    /// `false` if the id is unknown.
    pub fn restore_snapshot(&self, id: SnapshotId, cache: &mut EntityCache) -> bool {
        let Some(snapshot) = self.get(id) else {
            tracing::warn!(snapshot_id = %id, "restore requested for unknown snapshot");
            return false;
        };

        for (resource_type, records) in &snapshot.data {
            cache.set_collection(*resource_type, records.clone());
        }
        tracing::info!(snapshot_id = %id, description = %snapshot.description, "restored snapshot");
        true
    }

    pub fn delete_snapshot(&mut self, id: SnapshotId) -> bool {
        let before = self.snapshots.len();
        self.snapshots.retain(|s| s.id != id);
        self.snapshots.len() != before
    }

    pub fn get(&self, id: SnapshotId) -> Option<&DataSnapshot> {
        self.snapshots.iter().find(|s| s.id == id)
    }

    /// All snapshots, newest first.
    pub fn list_snapshots(&self) -> &[DataSnapshot] {
        &self.snapshots
    }

    /// The newest `n` snapshots, cloned.
    pub fn newest(&self, n: usize) -> Vec<DataSnapshot> {
        self.snapshots.iter().take(n).cloned().collect()
    }

    pub fn max_snapshots(&self) -> usize {
        self.max_snapshots
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}

impl Default for SnapshotManager {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_SNAPSHOTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::Entity;

    fn cache_with(products: &[&str]) -> EntityCache {
        let mut cache = EntityCache::new();
        cache.set_collection(
            ResourceType::Products,
            products.iter().map(|id| Record::new(*id)).collect(),
        );
        cache.set_collection(ResourceType::Suppliers, vec![Record::new("s1")]);
        cache
    }

    #[test]
    fn restore_brings_back_tracked_collections_only() {
        let mut cache = cache_with(&["p1", "p2"]);
        let mut manager = SnapshotManager::default();
        let id = manager.create_snapshot(&cache, "before bulk edit", Utc::now());

        cache.remove_item(ResourceType::Products, &"p1".into());
        cache.add_item(ResourceType::Suppliers, Record::new("s2"));

        assert!(manager.restore_snapshot(id, &mut cache));
        let products: Vec<_> = cache
            .items(ResourceType::Products)
            .iter()
            .map(|r| r.id().to_string())
            .collect();
        assert_eq!(products, vec!["p1", "p2"]);
        assert_eq!(cache.len(ResourceType::Suppliers), 2);
    }

    #[test]
    fn restore_leaves_collections_missing_from_payload() {
        let mut cache = cache_with(&["p1"]);
        cache.set_collection(ResourceType::Categories, vec![Record::new("c1")]);

        let partial = DataSnapshot {
            id: SnapshotId::new(),
            timestamp: Utc::now(),
            description: "products only".into(),
            data: BTreeMap::from([(ResourceType::Products, Vec::new())]),
        };
        let manager = SnapshotManager::with_snapshots(vec![partial.clone()], 5);

        assert!(manager.restore_snapshot(partial.id, &mut cache));
        assert!(cache.items(ResourceType::Products).is_empty());
        assert_eq!(cache.len(ResourceType::Categories), 1);
    }

    #[test]
    fn list_is_bounded_and_newest_first() {
        let cache = cache_with(&["p1"]);
        let mut manager = SnapshotManager::new(3);
        let ids: Vec<_> = (0..5)
            .map(|i| manager.create_snapshot(&cache, format!("snap {i}"), Utc::now()))
            .collect();

        let listed: Vec<_> = manager.list_snapshots().iter().map(|s| s.id).collect();
        assert_eq!(listed, vec![ids[4], ids[3], ids[2]]);
        assert_eq!(manager.newest(2).len(), 2);
    }

    #[test]
    fn unknown_ids_are_reported_not_raised() {
        let mut cache = cache_with(&["p1"]);
        let mut manager = SnapshotManager::default();
        assert!(!manager.restore_snapshot(SnapshotId::new(), &mut cache));
        assert!(!manager.delete_snapshot(SnapshotId::new()));

        let id = manager.create_snapshot(&cache, "x", Utc::now());
        assert!(manager.delete_snapshot(id));
        assert!(manager.list_snapshots().is_empty());
    }

    #[test]
    fn snapshot_is_a_deep_copy() {
        let mut cache = cache_with(&["p1"]);
        let mut manager = SnapshotManager::default();
        let id = manager.create_snapshot(&cache, "x", Utc::now());

        cache.set_collection(ResourceType::Products, Vec::new());
        let snapshot = manager.get(id).unwrap();
        assert_eq!(snapshot.data[&ResourceType::Products].len(), 1);
        assert!(!snapshot.data.contains_key(&ResourceType::Suppliers));
    }
}
