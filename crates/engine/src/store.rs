//! The offline store service object.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use storefront_cache::{
    ConflictResolution, DataSnapshot, DeltaReport, EntityCache, PurgeReport, ResourceVersion,
    SnapshotManager, VersionTracker,
};
use storefront_catalog::{BundleOffer, Patch, ProductSnapshot, Record, ResourceType};
use storefront_cart::CartEngine;
use storefront_core::{
    ActionId, BundleGroupId, ChangeEvent, Clock, ObserverId, Observers, RecordId, Shared,
    SnapshotId, StoreError, StoreResult, SystemClock,
};
use storefront_queue::{ActionDraft, ActionQueue, ActionStatus, ActionStatusPatch, OfflineAction};
use storefront_remote::RemoteService;
use storefront_storage::{KeyValueStore, PersistWriter, StorageError, load_or_default};
use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::persist::{
    CACHE_NAMESPACE, CART_NAMESPACE, CacheParts, PersistedCacheState, PersistedCartState,
    STATE_KEY,
};
use crate::replay::{self, ReplayReport};
use crate::sync::SyncStatus;

/// Offline-first store: entity cache, action queue, snapshots, versions and
/// cart behind one handle.
///
/// Built with `init`, torn down with `shutdown`. Every mutation notifies
/// observers; a built-in observer writes the affected store to disk in the
/// background.
pub struct OfflineStore<R> {
    config: EngineConfig,
    cache: Shared<EntityCache>,
    queue: Shared<ActionQueue>,
    snapshots: Shared<SnapshotManager>,
    versions: Shared<VersionTracker>,
    sync: Shared<SyncStatus>,
    cart: CartEngine<R>,
    remote: Arc<R>,
    observers: Observers,
    clock: Arc<dyn Clock>,
    writer: PersistWriter,
    writer_task: JoinHandle<()>,
    persistence: ObserverId,
}

impl<R: RemoteService + 'static> OfflineStore<R> {
    /// Hydrate from `storage` and start the background writer.
    ///
    /// Missing or unreadable persisted state yields an empty store.
    pub async fn init(config: EngineConfig, remote: Arc<R>, storage: Arc<dyn KeyValueStore>) -> Self {
        Self::init_with_clock(config, remote, storage, Arc::new(SystemClock)).await
    }

    pub async fn init_with_clock(
        config: EngineConfig,
        remote: Arc<R>,
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let persisted_cache: PersistedCacheState =
            load_or_default(storage.as_ref(), CACHE_NAMESPACE, STATE_KEY).await;
        let persisted_cart: PersistedCartState =
            load_or_default(storage.as_ref(), CART_NAMESPACE, STATE_KEY).await;

        let (cache, queue, snapshots, versions, sync) = persisted_cache.into_state(&config);
        tracing::info!(
            queued_actions = queue.len(),
            snapshots = snapshots.list_snapshots().len(),
            conflicts = versions.len(),
            cart_items = persisted_cart.cart_items.len(),
            "offline store hydrated"
        );

        let observers = Observers::new();
        let queue = Shared::new(queue);
        let cart = CartEngine::new(
            Arc::clone(&remote),
            queue.clone(),
            observers.clone(),
            Arc::clone(&clock),
        )
        .with_action_max_retries(config.default_action_max_retries);
        cart.load(persisted_cart.cart_items, persisted_cart.last_snapshot);

        let (writer, writer_task) = PersistWriter::spawn(storage);

        let cache = Shared::new(cache);
        let snapshots = Shared::new(snapshots);
        let versions = Shared::new(versions);
        let sync = Shared::new(sync);

        let persistence = {
            let config = config.clone();
            let cache = cache.clone();
            let queue = queue.clone();
            let snapshots = snapshots.clone();
            let versions = versions.clone();
            let sync = sync.clone();
            let cart = cart.clone();
            let writer = writer.clone();

            observers.register(move |event| match event {
                ChangeEvent::Cart => {
                    let state = PersistedCartState::from_state(&cart.state());
                    write_json(&writer, CART_NAMESPACE, &state);
                }
                ChangeEvent::Cache
                | ChangeEvent::Queue
                | ChangeEvent::Snapshots
                | ChangeEvent::Versions => {
                    let state = cache.read(|cache| {
                        queue.read(|queue| {
                            snapshots.read(|snapshots| {
                                versions.read(|versions| {
                                    sync.read(|sync| {
                                        PersistedCacheState::from_state(
                                            CacheParts {
                                                cache,
                                                queue,
                                                snapshots,
                                                versions,
                                                sync,
                                            },
                                            &config,
                                        )
                                    })
                                })
                            })
                        })
                    });
                    write_json(&writer, CACHE_NAMESPACE, &state);
                }
            })
        };

        Self {
            config,
            cache,
            queue,
            snapshots,
            versions,
            sync,
            cart,
            remote,
            observers,
            clock,
            writer,
            writer_task,
            persistence,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cart(&self) -> &CartEngine<R> {
        &self.cart
    }

    /// Register a change callback.
    pub fn subscribe<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(ChangeEvent) + Send + Sync + 'static,
    {
        self.observers.register(callback)
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        id != self.persistence && self.observers.unregister(id)
    }

    fn changed(&self, event: ChangeEvent) {
        self.observers.notify(event);
    }

    // ---- entity cache ----

    pub fn set_collection(&self, resource_type: ResourceType, items: Vec<Record>) {
        self.cache.write(|c| c.set_collection(resource_type, items));
        self.changed(ChangeEvent::Cache);
    }

    pub fn add_item(&self, resource_type: ResourceType, item: Record) -> bool {
        let added = self.cache.write(|c| c.add_item(resource_type, item));
        if added {
            self.changed(ChangeEvent::Cache);
        }
        added
    }

    pub fn update_item(&self, resource_type: ResourceType, id: &RecordId, patch: &Patch) -> bool {
        let now = self.clock.now();
        let updated = self.cache.write(|c| c.update_item(resource_type, id, patch, now));
        if updated {
            self.changed(ChangeEvent::Cache);
        }
        updated
    }

    pub fn remove_item(&self, resource_type: ResourceType, id: &RecordId) -> bool {
        let removed = self.cache.write(|c| c.remove_item(resource_type, id));
        if removed {
            self.changed(ChangeEvent::Cache);
        }
        removed
    }

    pub fn get_item(&self, resource_type: ResourceType, id: &RecordId) -> Option<Record> {
        self.cache.read(|c| c.get(resource_type, id).cloned())
    }

    pub fn items(&self, resource_type: ResourceType) -> Vec<Record> {
        self.cache.read(|c| c.items(resource_type).to_vec())
    }

    pub fn purge_deleted_items(
        &self,
        server_ids: &HashMap<ResourceType, HashSet<RecordId>>,
    ) -> PurgeReport {
        let report = self.cache.write(|c| c.purge_deleted_items(server_ids));
        if report.total_purged > 0 {
            self.changed(ChangeEvent::Cache);
        }
        report
    }

    pub fn apply_delta(
        &self,
        resource_type: ResourceType,
        changed: Vec<Record>,
        deleted_ids: &[RecordId],
    ) -> DeltaReport {
        let report = self
            .cache
            .write(|c| c.apply_delta(resource_type, changed, deleted_ids));
        self.changed(ChangeEvent::Cache);
        report
    }

    // ---- sync bookkeeping ----

    /// Record a successful pull and how many records each type received.
    pub fn record_sync(&self, results: BTreeMap<ResourceType, usize>) {
        let now = self.clock.now();
        self.sync.write(|s| s.record_success(results, now));
        self.changed(ChangeEvent::Cache);
    }

    pub fn record_sync_error(&self, error: impl Into<String>) {
        let error = error.into();
        tracing::warn!(error = %error, "sync pass failed");
        self.sync.write(|s| s.record_error(error));
        self.changed(ChangeEvent::Cache);
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.sync.snapshot()
    }

    pub fn last_error(&self) -> Option<String> {
        self.sync.read(|s| s.last_error.clone())
    }

    // ---- offline queue ----

    pub fn enqueue_action(&self, draft: ActionDraft) -> ActionId {
        let now = self.clock.now();
        let id = self.queue.write(|q| q.enqueue(draft, now));
        self.changed(ChangeEvent::Queue);
        id
    }

    pub fn remove_action(&self, id: ActionId) -> bool {
        let removed = self.queue.write(|q| q.remove(id));
        if removed {
            self.changed(ChangeEvent::Queue);
        }
        removed
    }

    pub fn update_action_status(&self, id: ActionId, patch: ActionStatusPatch) -> bool {
        let updated = self.queue.write(|q| q.update_status(id, patch));
        if updated {
            self.changed(ChangeEvent::Queue);
        }
        updated
    }

    pub fn record_action_failure(&self, id: ActionId, error: impl Into<String>) -> Option<ActionStatus> {
        let status = self.queue.write(|q| q.record_failure(id, error));
        if status.is_some() {
            self.changed(ChangeEvent::Queue);
        }
        status
    }

    /// Evict aged and permanently failed actions using the configured limits.
    pub fn purge_old_queue_items(&self) -> usize {
        let now = self.clock.now();
        let removed = self.queue.write(|q| {
            q.purge_stale(now, self.config.queue_max_age_days, self.config.queue_max_retries)
        });
        if removed > 0 {
            self.changed(ChangeEvent::Queue);
        }
        removed
    }

    pub fn cleanup_after_sync(&self) -> usize {
        let removed = self.queue.write(ActionQueue::cleanup_after_sync);
        if removed > 0 {
            self.changed(ChangeEvent::Queue);
        }
        removed
    }

    pub fn get_queue_length(&self) -> usize {
        self.queue.read(ActionQueue::len)
    }

    pub fn queued_actions(&self) -> Vec<OfflineAction> {
        self.queue.read(|q| q.actions().to_vec())
    }

    /// One FIFO pass over the pending actions.
    pub async fn replay_queue(&self) -> ReplayReport {
        replay::replay_pending(&self.queue, self.remote.as_ref(), || {
            self.changed(ChangeEvent::Queue)
        })
        .await
    }

    // ---- snapshots ----

    pub fn create_snapshot(&self, description: impl Into<String>) -> SnapshotId {
        let now = self.clock.now();
        let id = self.cache.read(|cache| {
            self.snapshots
                .write(|s| s.create_snapshot(cache, description, now))
        });
        self.changed(ChangeEvent::Snapshots);
        id
    }

    pub fn restore_snapshot(&self, id: SnapshotId) -> bool {
        // Lock order everywhere: cache before snapshots.
        let restored = self.cache.write(|cache| {
            self.snapshots
                .read(|snapshots| snapshots.restore_snapshot(id, cache))
        });
        if restored {
            self.changed(ChangeEvent::Cache);
        }
        restored
    }

    pub fn delete_snapshot(&self, id: SnapshotId) -> bool {
        let deleted = self.snapshots.write(|s| s.delete_snapshot(id));
        if deleted {
            self.changed(ChangeEvent::Snapshots);
        }
        deleted
    }

    pub fn list_snapshots(&self) -> Vec<DataSnapshot> {
        self.snapshots.read(|s| s.list_snapshots().to_vec())
    }

    // ---- resource versions ----

    pub fn track_resource_version(&self, id: RecordId, resource_type: ResourceType, version: u64) {
        let now = self.clock.now();
        self.versions
            .write(|v| v.track_version(id, resource_type, version, now));
        self.changed(ChangeEvent::Versions);
    }

    pub fn check_conflict(&self, id: &RecordId, resource_type: ResourceType, server_version: u64) -> bool {
        let conflict = self
            .versions
            .write(|v| v.check_conflict(id, resource_type, server_version));
        if conflict {
            self.changed(ChangeEvent::Versions);
        }
        conflict
    }

    pub fn resolve_conflict(
        &self,
        id: &RecordId,
        resource_type: ResourceType,
        resolution: ConflictResolution,
    ) -> bool {
        let resolved = self
            .versions
            .write(|v| v.resolve_conflict(id, resource_type, resolution));
        if resolved {
            self.changed(ChangeEvent::Versions);
        }
        resolved
    }

    pub fn get_conflicts(&self) -> Vec<ResourceVersion> {
        self.versions.read(VersionTracker::conflicted_only)
    }

    pub fn get_resource_version(&self, id: &RecordId, resource_type: ResourceType) -> Option<ResourceVersion> {
        self.versions.read(|v| v.get(id, resource_type).cloned())
    }

    /// Drop unconflicted versions older than the retention window.
    pub fn cleanup_versions(&self) -> usize {
        let now = self.clock.now();
        let retention = self.config.version_retention();
        let removed = self.versions.write(|v| v.cleanup(now, retention));
        if removed > 0 {
            self.changed(ChangeEvent::Versions);
        }
        removed
    }

    // ---- cart over the catalog ----

    /// Add a product by id, using its cached record as the line's snapshot.
    pub async fn add_product_to_cart(&self, product_id: &RecordId, quantity: u32) {
        let product = self
            .get_item(ResourceType::Products, product_id)
            .and_then(|record| ProductSnapshot::from_record(&record))
            .unwrap_or_else(|| {
                tracing::warn!(product_id = %product_id, "product not cached; adding without details");
                ProductSnapshot::bare(product_id.clone())
            });
        self.cart.add_to_cart(product, quantity).await;
    }

    /// Add a cached bundle offer with its cached products.
    ///
    /// Fails with `NotFound` if the offer or any of its products is not
    /// cached, and with `Validation` for an invalid offer; both before any
    /// change.
    pub async fn add_bundle_offer_to_cart(&self, offer_id: &RecordId) -> StoreResult<BundleGroupId> {
        let (offer, products) = self.cache.read(|c| {
            let offer = c
                .get(ResourceType::BundleOffers, offer_id)
                .and_then(BundleOffer::from_record)
                .ok_or_else(StoreError::not_found)?;
            let products = offer
                .product_ids
                .iter()
                .map(|id| {
                    c.get(ResourceType::Products, id)
                        .and_then(ProductSnapshot::from_record)
                        .ok_or_else(StoreError::not_found)
                })
                .collect::<StoreResult<Vec<_>>>()?;
            Ok::<_, StoreError>((offer, products))
        })?;

        if !offer.is_active {
            return Err(StoreError::validation(format!("bundle offer {} is not active", offer.id)));
        }
        self.cart.add_bundle_to_cart(&offer, products).await
    }

    // ---- lifecycle ----

    /// Forget everything local: collections, queue, snapshots, versions,
    /// sync bookkeeping and the cart.
    pub fn logout(&self) {
        self.cache.write(EntityCache::clear);
        self.queue.write(ActionQueue::clear);
        self.snapshots.write(SnapshotManager::clear);
        self.versions.write(VersionTracker::clear);
        self.sync.write(|s| *s = SyncStatus::default());
        self.cart.load(Vec::new(), None);
        self.changed(ChangeEvent::Cache);
        tracing::info!("offline store cleared on logout");
    }

    /// Wait until every write issued so far has been attempted.
    pub async fn flush(&self) -> Result<(), StorageError> {
        self.writer.flush().await
    }

    /// Flush pending writes and stop the background writer.
    pub async fn shutdown(self) -> Result<(), StorageError> {
        self.observers.unregister(self.persistence);
        let flushed = self.writer.flush().await;
        self.writer_task.abort();
        tracing::info!("offline store shut down");
        flushed
    }
}

fn write_json<T: serde::Serialize>(writer: &PersistWriter, namespace: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => writer.write(namespace, STATE_KEY, json),
        Err(err) => {
            tracing::error!(namespace, error = %err, "failed to encode state for persistence");
        }
    }
}
