//! Entity cache: one collection per resource type.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storefront_catalog::{Patch, Record, ResourceType};
use storefront_core::{Entity, RecordId};

use crate::collection::CachedCollection;

/// Outcome of a zero-waste purge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeReport {
    pub purged_counts: BTreeMap<ResourceType, usize>,
    pub total_purged: usize,
}

/// Outcome of applying a server delta to one collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaReport {
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
}

/// Local mirror of the server collections.
///
/// In memory every collection is unbounded; size caps only apply when the
/// cache is persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityCache {
    collections: BTreeMap<ResourceType, CachedCollection<Record>>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a whole collection.
    pub fn set_collection(&mut self, resource_type: ResourceType, items: Vec<Record>) {
        tracing::debug!(%resource_type, count = items.len(), "replacing cached collection");
        self.collections.insert(resource_type, items.into());
    }

    /// Add a record unless one with the same id is cached. Returns `true` if added.
    pub fn add_item(&mut self, resource_type: ResourceType, item: Record) -> bool {
        self.collections
            .entry(resource_type)
            .or_default()
            .insert(item)
    }

    /// Shallow-merge `patch` into a cached record and stamp its local
    /// modification time. Returns `false` if the record is not cached.
    pub fn update_item(
        &mut self,
        resource_type: ResourceType,
        id: &RecordId,
        patch: &Patch,
        now: DateTime<Utc>,
    ) -> bool {
        match self
            .collections
            .get_mut(&resource_type)
            .and_then(|c| c.get_mut(id))
        {
            Some(record) => {
                record.apply_patch(patch, now);
                true
            }
            None => false,
        }
    }

    pub fn remove_item(&mut self, resource_type: ResourceType, id: &RecordId) -> bool {
        self.collections
            .get_mut(&resource_type)
            .and_then(|c| c.remove(id))
            .is_some()
    }

    pub fn get(&self, resource_type: ResourceType, id: &RecordId) -> Option<&Record> {
        self.collections.get(&resource_type)?.get(id)
    }

    pub fn collection(&self, resource_type: ResourceType) -> Option<&CachedCollection<Record>> {
        self.collections.get(&resource_type)
    }

    /// Records of one type in insertion order; empty if never loaded.
    pub fn items(&self, resource_type: ResourceType) -> &[Record] {
        self.collections
            .get(&resource_type)
            .map(CachedCollection::items)
            .unwrap_or(&[])
    }

    pub fn len(&self, resource_type: ResourceType) -> usize {
        self.items(resource_type).len()
    }

    /// Zero-waste reconciliation against authoritative server id sets.
    ///
    /// For each type present in `server_ids`, keeps only records whose id is
    /// in the set. Types absent from the map are never touched.
    pub fn purge_deleted_items(
        &mut self,
        server_ids: &HashMap<ResourceType, HashSet<RecordId>>,
    ) -> PurgeReport {
        let mut report = PurgeReport::default();

        for (resource_type, keep) in server_ids {
            let purged = match self.collections.get_mut(resource_type) {
                Some(collection) => collection.retain(|record| keep.contains(record.id())),
                None => 0,
            };
            report.purged_counts.insert(*resource_type, purged);
            report.total_purged += purged;
        }

        if report.total_purged > 0 {
            tracing::info!(
                total_purged = report.total_purged,
                "purged records deleted on the server"
            );
        }
        report
    }

    /// Apply a delta pull: upsert `changed` (server copy wins, existing ids
    /// keep their position) and drop `deleted_ids`.
    pub fn apply_delta(
        &mut self,
        resource_type: ResourceType,
        changed: Vec<Record>,
        deleted_ids: &[RecordId],
    ) -> DeltaReport {
        let collection = self.collections.entry(resource_type).or_default();
        let mut report = DeltaReport::default();

        for record in changed {
            if collection.upsert(record) {
                report.inserted += 1;
            } else {
                report.updated += 1;
            }
        }
        for id in deleted_ids {
            if collection.remove(id).is_some() {
                report.removed += 1;
            }
        }

        tracing::debug!(
            %resource_type,
            inserted = report.inserted,
            updated = report.updated,
            removed = report.removed,
            "applied delta"
        );
        report
    }

    /// Types that currently have a collection (possibly empty).
    pub fn resource_types(&self) -> impl Iterator<Item = ResourceType> + '_ {
        self.collections.keys().copied()
    }

    pub fn clear(&mut self) {
        self.collections.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(cache: &EntityCache, resource_type: ResourceType) -> Vec<String> {
        cache
            .items(resource_type)
            .iter()
            .map(|r| r.id().to_string())
            .collect()
    }

    #[test]
    fn adding_the_same_id_twice_keeps_one_entry() {
        let mut cache = EntityCache::new();
        assert!(cache.add_item(ResourceType::Products, Record::new("p1")));
        assert!(!cache.add_item(ResourceType::Products, Record::new("p1")));
        assert_eq!(cache.len(ResourceType::Products), 1);
    }

    #[test]
    fn update_merges_and_ignores_missing_ids() {
        let mut cache = EntityCache::new();
        cache.set_collection(
            ResourceType::Products,
            vec![Record::new("p1").with("name", "Filter").with("price", 10)],
        );
        let now = Utc::now();
        let patch = Patch::from_iter([("price".to_string(), json!(12))]);

        assert!(cache.update_item(ResourceType::Products, &"p1".into(), &patch, now));
        assert!(!cache.update_item(ResourceType::Products, &"nope".into(), &patch, now));
        assert!(!cache.update_item(ResourceType::Orders, &"p1".into(), &patch, now));

        let record = cache.get(ResourceType::Products, &"p1".into()).unwrap();
        assert_eq!(record.get("price"), Some(&json!(12)));
        assert_eq!(record.get("name"), Some(&json!("Filter")));
        assert_eq!(record.local_modified_at(), Some(now));
    }

    #[test]
    fn remove_reports_whether_anything_was_dropped() {
        let mut cache = EntityCache::new();
        cache.set_collection(ResourceType::Categories, vec![Record::new("c1")]);
        assert!(cache.remove_item(ResourceType::Categories, &"c1".into()));
        assert!(!cache.remove_item(ResourceType::Categories, &"c1".into()));
        assert!(!cache.remove_item(ResourceType::Orders, &"c1".into()));
    }

    #[test]
    fn purge_only_touches_listed_types() {
        let mut cache = EntityCache::new();
        cache.set_collection(
            ResourceType::Products,
            vec![Record::new("id1"), Record::new("id2")],
        );
        cache.set_collection(ResourceType::Categories, vec![Record::new("c1")]);

        let server_ids = HashMap::from([(
            ResourceType::Products,
            HashSet::from([RecordId::from("id2")]),
        )]);
        let report = cache.purge_deleted_items(&server_ids);

        assert_eq!(report.purged_counts.get(&ResourceType::Products), Some(&1));
        assert_eq!(report.total_purged, 1);
        assert_eq!(ids(&cache, ResourceType::Products), vec!["id2"]);
        assert_eq!(ids(&cache, ResourceType::Categories), vec!["c1"]);
    }

    #[test]
    fn purge_with_empty_set_empties_that_type() {
        let mut cache = EntityCache::new();
        cache.set_collection(ResourceType::CarBrands, vec![Record::new("b1"), Record::new("b2")]);

        let report = cache.purge_deleted_items(&HashMap::from([(ResourceType::CarBrands, HashSet::new())]));
        assert_eq!(report.total_purged, 2);
        assert!(cache.items(ResourceType::CarBrands).is_empty());
    }

    #[test]
    fn delta_upserts_in_place_and_removes() {
        let mut cache = EntityCache::new();
        cache.set_collection(
            ResourceType::Products,
            vec![Record::new("a").with("v", 1), Record::new("b"), Record::new("c")],
        );

        let report = cache.apply_delta(
            ResourceType::Products,
            vec![Record::new("a").with("v", 2), Record::new("d")],
            &["b".into(), "zz".into()],
        );

        assert_eq!(
            report,
            DeltaReport {
                inserted: 1,
                updated: 1,
                removed: 1
            }
        );
        assert_eq!(ids(&cache, ResourceType::Products), vec!["a", "c", "d"]);
        assert_eq!(
            cache.get(ResourceType::Products, &"a".into()).unwrap().get("v"),
            Some(&json!(2))
        );
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: repeated adds never produce duplicate ids.
            #[test]
            fn adds_stay_unique(raw_ids in proptest::collection::vec(0u8..16, 0..64)) {
                let mut cache = EntityCache::new();
                for id in &raw_ids {
                    cache.add_item(ResourceType::Products, Record::new(format!("p{id}")));
                }

                let distinct: HashSet<_> = raw_ids.iter().collect();
                prop_assert_eq!(cache.len(ResourceType::Products), distinct.len());
            }

            /// Property: purge keeps exactly the intersection with the server set.
            #[test]
            fn purge_keeps_intersection(
                local in proptest::collection::hash_set(0u8..32, 0..20),
                server in proptest::collection::hash_set(0u8..32, 0..20)
            ) {
                let mut cache = EntityCache::new();
                cache.set_collection(
                    ResourceType::Products,
                    local.iter().map(|i| Record::new(format!("p{i}"))).collect(),
                );
                let server_ids = HashMap::from([(
                    ResourceType::Products,
                    server.iter().map(|i| RecordId::new(format!("p{i}"))).collect(),
                )]);

                let report = cache.purge_deleted_items(&server_ids);
                let kept = local.intersection(&server).count();
                prop_assert_eq!(cache.len(ResourceType::Products), kept);
                prop_assert_eq!(report.total_purged, local.len() - kept);
            }
        }
    }
}
