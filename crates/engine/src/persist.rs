//! Mapping between live state and what reaches disk.
//!
//! Both payloads default-fill every field, so state written by an older
//! version still loads.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storefront_cache::{DataSnapshot, EntityCache, ResourceVersion, SnapshotManager, VersionTracker};
use storefront_catalog::{Record, ResourceType};
use storefront_cart::{CartItem, CartSnapshot, CartState};
use storefront_queue::ActionQueue;

use crate::config::EngineConfig;
use crate::sync::SyncStatus;

pub const CACHE_NAMESPACE: &str = "cache";
pub const CART_NAMESPACE: &str = "cart";
pub const STATE_KEY: &str = "state";

/// Persisted subset of the cache store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedCacheState {
    pub last_sync_time: Option<DateTime<Utc>>,
    pub last_sync_results: BTreeMap<ResourceType, usize>,
    pub offline_actions_queue: ActionQueue,
    pub snapshots: Vec<DataSnapshot>,
    pub resource_versions: Vec<ResourceVersion>,
    pub collections: BTreeMap<ResourceType, Vec<Record>>,
}

/// Live components the cache payload is built from.
pub struct CacheParts<'a> {
    pub cache: &'a EntityCache,
    pub queue: &'a ActionQueue,
    pub snapshots: &'a SnapshotManager,
    pub versions: &'a VersionTracker,
    pub sync: &'a SyncStatus,
}

impl PersistedCacheState {
    /// Full queue, newest snapshots, conflicted versions only, and capped
    /// prefixes of the non-operational collections named in the config.
    pub fn from_state(parts: CacheParts<'_>, config: &EngineConfig) -> Self {
        let collections = parts
            .cache
            .resource_types()
            .filter_map(|resource_type| {
                let limit = config.persist_limit(resource_type)?;
                let records = parts.cache.collection(resource_type)?.prefix(limit);
                Some((resource_type, records))
            })
            .collect();

        Self {
            last_sync_time: parts.sync.last_sync_time,
            last_sync_results: parts.sync.last_sync_results.clone(),
            offline_actions_queue: parts.queue.clone(),
            snapshots: parts.snapshots.newest(config.persisted_snapshots),
            resource_versions: parts.versions.conflicted_only(),
            collections,
        }
    }

    /// Rebuild live components. Collections that are not persistable under
    /// `config` are dropped.
    pub fn into_state(
        self,
        config: &EngineConfig,
    ) -> (EntityCache, ActionQueue, SnapshotManager, VersionTracker, SyncStatus) {
        let mut cache = EntityCache::new();
        for (resource_type, records) in self.collections {
            if config.persist_limit(resource_type).is_none() {
                tracing::debug!(%resource_type, "skipping non-persistable collection in stored state");
                continue;
            }
            cache.set_collection(resource_type, records);
        }

        let sync = SyncStatus {
            last_sync_time: self.last_sync_time,
            last_sync_results: self.last_sync_results,
            last_error: None,
        };

        let mut queue = self.offline_actions_queue;
        let requeued = queue.requeue_in_flight();
        if requeued > 0 {
            tracing::info!(requeued, "requeued actions cut off mid-delivery");
        }

        (
            cache,
            queue,
            SnapshotManager::with_snapshots(self.snapshots, config.max_snapshots),
            VersionTracker::from(self.resource_versions),
            sync,
        )
    }
}

/// Persisted cart store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedCartState {
    pub cart_items: Vec<CartItem>,
    pub last_snapshot: Option<CartSnapshot>,
}

impl PersistedCartState {
    pub fn from_state(state: &CartState) -> Self {
        Self {
            cart_items: state.items.clone(),
            last_snapshot: state.last_snapshot.clone(),
        }
    }
}
