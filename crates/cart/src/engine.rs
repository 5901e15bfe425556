//! Optimistic cart engine.

use std::sync::Arc;

use storefront_catalog::{BundleOffer, ProductSnapshot};
use storefront_core::{
    ActionId, BundleGroupId, ChangeEvent, Clock, Observers, RecordId, Shared, StoreError,
    StoreResult,
};
use storefront_queue::{ActionDraft, ActionQueue, MutationPayload};
use storefront_remote::{CartUpdateBody, RemoteService};

use crate::bundle::{self, BundleGroup};
use crate::item::CartItem;
use crate::pricing::{self, CartTotals};
use crate::server;
use crate::state::{CartSnapshot, CartState};

/// Cart engine over a remote service `R`.
///
/// State lives behind `Shared` handles and is only touched inside
/// synchronous closures; every `.await` happens with no lock held, and
/// anything needed after a remote call is re-read.
pub struct CartEngine<R> {
    state: Shared<CartState>,
    queue: Shared<ActionQueue>,
    remote: Arc<R>,
    observers: Observers,
    clock: Arc<dyn Clock>,
    action_max_retries: u32,
}

impl<R> Clone for CartEngine<R> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            queue: self.queue.clone(),
            remote: Arc::clone(&self.remote),
            observers: self.observers.clone(),
            clock: Arc::clone(&self.clock),
            action_max_retries: self.action_max_retries,
        }
    }
}

impl<R: RemoteService> CartEngine<R> {
    pub fn new(
        remote: Arc<R>,
        queue: Shared<ActionQueue>,
        observers: Observers,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: Shared::default(),
            queue,
            remote,
            observers,
            clock,
            action_max_retries: ActionDraft::DEFAULT_MAX_RETRIES,
        }
    }

    /// Max retries given to actions queued by failed mirror calls.
    pub fn with_action_max_retries(mut self, max_retries: u32) -> Self {
        self.action_max_retries = max_retries;
        self
    }

    /// Replace local state wholesale (hydration, logout).
    pub fn load(&self, items: Vec<CartItem>, last_snapshot: Option<CartSnapshot>) {
        self.state.write(|s| *s = CartState::new(items, last_snapshot));
        self.observers.notify(ChangeEvent::Cart);
    }

    pub fn state(&self) -> CartState {
        self.state.snapshot()
    }

    pub fn items(&self) -> Vec<CartItem> {
        self.state.read(|s| s.items.clone())
    }

    pub fn is_loading(&self) -> bool {
        self.state.read(|s| s.is_loading)
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.read(|s| s.last_error.clone())
    }

    /// Σ quantity over all lines.
    pub fn item_count(&self) -> u64 {
        self.state.read(CartState::total_quantity)
    }

    /// Add `quantity` of a plain product line.
    pub async fn add_to_cart(&self, product: ProductSnapshot, quantity: u32) {
        let now = self.clock.now();
        self.add_item(CartItem::new(product, quantity, now)).await;
    }

    /// Add a line, merging into an existing line with the same
    /// `(product_id, bundle_group_id)`.
    pub async fn add_item(&self, item: CartItem) {
        if item.quantity == 0 {
            tracing::debug!(product_id = %item.product_id, "ignoring add with zero quantity");
            return;
        }

        let now = self.clock.now();
        let body = item.add_body(item.quantity);
        self.state.write(|s| s.merge_item(item, now));
        self.observers.notify(ChangeEvent::Cart);

        self.mirror("cart_add", MutationPayload::CartAdd(body)).await;
    }

    /// Add every product of `offer` as one bundle instance.
    ///
    /// The lines share a fresh group id and are appended in one step. The
    /// cart is snapshotted first; mirror failures are queued, never rolled
    /// back.
    pub async fn add_bundle_to_cart(
        &self,
        offer: &BundleOffer,
        products: Vec<ProductSnapshot>,
    ) -> StoreResult<BundleGroupId> {
        offer.validate()?;
        if products.is_empty() {
            return Err(StoreError::validation(format!(
                "bundle offer {} has no products",
                offer.id
            )));
        }

        let now = self.clock.now();
        let group = BundleGroupId::generate();

        let mut lines = CartState::default();
        for product in products {
            let original = product.price.unwrap_or(0.0);
            let mut item = CartItem::new(product, 1, now);
            item.bundle_group_id = Some(group.clone());
            item.bundle_offer_id = Some(offer.id.clone());
            item.bundle_offer_name = Some(offer.name.clone());
            item.bundle_discount = Some(offer.discount_percentage);
            item.original_price = Some(original);
            item.discounted_price = Some(pricing::discounted_unit_price(
                original,
                offer.discount_percentage,
            ));
            lines.merge_item(item, now);
        }
        let bodies: Vec<_> = lines.items.iter().map(|i| i.add_body(i.quantity)).collect();

        self.state.write(|s| {
            s.take_snapshot(now);
            s.items.extend(lines.items);
        });
        tracing::info!(
            bundle_group_id = %group,
            bundle_offer_id = %offer.id,
            lines = bodies.len(),
            "added bundle to cart"
        );
        self.observers.notify(ChangeEvent::Cart);

        for body in bodies {
            self.mirror("cart_add", MutationPayload::CartAdd(body)).await;
        }
        Ok(group)
    }

    /// Remove the first line holding `product_id`.
    ///
    /// With `void_bundle`, a bundled target first voids the discount of its
    /// whole group; only the target line is then deleted. Returns `false` if
    /// the product is not in the cart.
    pub async fn remove_from_cart(&self, product_id: &RecordId, void_bundle: bool) -> bool {
        let now = self.clock.now();
        let removed = self.state.write(|s| {
            let target = s.first_for_product(product_id)?;
            let group = target.bundle_group_id.clone();
            let line = s.remove_line(product_id, group.as_ref())?;
            let voided = match (&group, void_bundle) {
                (Some(group), true) => s.void_group(group, now),
                _ => 0,
            };
            Some((line, group, voided))
        });

        let Some((line, group, voided)) = removed else {
            return false;
        };
        tracing::debug!(
            product_id = %line.product_id,
            bundle_group_id = ?group,
            voided,
            "removed cart line"
        );
        self.observers.notify(ChangeEvent::Cart);

        if let (Some(group), true) = (group, void_bundle) {
            self.mirror(
                "cart_void_bundle",
                MutationPayload::CartVoidBundle {
                    bundle_group_id: group,
                },
            )
            .await;
        }
        self.mirror(
            "cart_update",
            MutationPayload::CartUpdate(CartUpdateBody {
                product_id: line.product_id,
                quantity: 0,
            }),
        )
        .await;
        true
    }

    /// Void the bundle discount of every line in `group`, all at once.
    ///
    /// Returns how many lines were voided; `0` issues no remote call.
    pub async fn void_bundle_discount(&self, group: &BundleGroupId) -> usize {
        let now = self.clock.now();
        let voided = self.state.write(|s| s.void_group(group, now));
        if voided == 0 {
            return 0;
        }

        tracing::info!(bundle_group_id = %group, voided, "voided bundle discount");
        self.observers.notify(ChangeEvent::Cart);
        self.mirror(
            "cart_void_bundle",
            MutationPayload::CartVoidBundle {
                bundle_group_id: group.clone(),
            },
        )
        .await;
        voided
    }

    /// Set the quantity of the first line holding `product_id`.
    ///
    /// `quantity <= 0` removes the line with the bundle-void cascade.
    pub async fn update_cart_item(&self, product_id: &RecordId, quantity: i64) -> bool {
        if quantity <= 0 {
            return self.remove_from_cart(product_id, true).await;
        }

        let now = self.clock.now();
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        let updated = self.state.write(|s| {
            match s.items.iter_mut().find(|i| &i.product_id == product_id) {
                Some(item) => {
                    item.quantity = quantity;
                    item.touch(now);
                    true
                }
                None => false,
            }
        });
        if !updated {
            return false;
        }

        self.observers.notify(ChangeEvent::Cart);
        self.mirror(
            "cart_update",
            MutationPayload::CartUpdate(CartUpdateBody {
                product_id: product_id.clone(),
                quantity,
            }),
        )
        .await;
        true
    }

    /// Empty the cart locally and on the server.
    pub async fn clear_cart(&self) {
        self.state.write(|s| s.items.clear());
        self.observers.notify(ChangeEvent::Cart);
        self.mirror("cart_clear", MutationPayload::CartClear).await;
    }

    /// Σ quantity × resolved unit price.
    pub fn get_cart_subtotal(&self) -> f64 {
        self.state.read(|s| pricing::subtotal(&s.items))
    }

    pub fn totals(&self) -> CartTotals {
        self.state.read(|s| CartTotals::of(&s.items))
    }

    pub fn get_bundle_groups(&self) -> Vec<BundleGroup> {
        self.state.read(|s| bundle::group_items(&s.items))
    }

    /// Snapshot the current lines as the rollback point.
    pub fn create_snapshot(&self) {
        let now = self.clock.now();
        self.state.write(|s| s.take_snapshot(now));
    }

    /// Put back the lines of the last snapshot. `false` if there is none.
    pub fn restore_snapshot(&self) -> bool {
        let restored = self.state.write(CartState::restore_snapshot);
        if restored {
            tracing::info!("restored cart snapshot");
            self.observers.notify(ChangeEvent::Cart);
        }
        restored
    }

    /// Replace the local cart with the server's authoritative lines.
    ///
    /// Snapshots first. Failures end up in `last_error`; this never errors.
    /// Returns whether the server cart was applied.
    pub async fn sync_with_server(&self) -> bool {
        let now = self.clock.now();
        self.state.write(|s| {
            s.take_snapshot(now);
            s.is_loading = true;
            s.last_error = None;
        });
        self.observers.notify(ChangeEvent::Cart);

        let result = self.remote.fetch_cart().await;

        let now = self.clock.now();
        let applied = match result {
            Ok(cart) => {
                let items = server::items_from_server(cart, now);
                tracing::info!(lines = items.len(), "cart synced with server");
                self.state.write(|s| {
                    s.items = items;
                    s.is_loading = false;
                    s.last_synced_at = Some(now);
                });
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "cart sync failed");
                self.state.write(|s| {
                    s.is_loading = false;
                    s.last_error = Some(err.to_string());
                });
                false
            }
        };
        self.observers.notify(ChangeEvent::Cart);
        applied
    }

    /// Send one mutation to the remote cart; queue it if the call fails.
    ///
    /// The queued action reuses the id already sent as idempotency key.
    async fn mirror(&self, action_type: &str, mutation: MutationPayload) {
        let id = ActionId::new();
        let request = mutation.to_request().with_idempotency_key(id.to_string());

        let Err(err) = self.remote.send(request).await else {
            return;
        };

        tracing::warn!(
            action_id = %id,
            action_type,
            error = %err,
            "cart mirror call failed; queued for replay"
        );
        let draft =
            ActionDraft::mutation(action_type, mutation).with_max_retries(self.action_max_retries);
        let now = self.clock.now();
        self.queue.write(|q| q.enqueue_as(id, draft, now));
        self.observers.notify(ChangeEvent::Queue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::SystemClock;
    use storefront_remote::{HttpMethod, InMemoryRemote, RemoteError};

    fn engine() -> (CartEngine<InMemoryRemote>, Arc<InMemoryRemote>, Shared<ActionQueue>) {
        let remote = Arc::new(InMemoryRemote::new());
        let queue = Shared::default();
        let engine = CartEngine::new(
            Arc::clone(&remote),
            queue.clone(),
            Observers::new(),
            Arc::new(SystemClock),
        );
        (engine, remote, queue)
    }

    fn product(id: &str, price: f64) -> ProductSnapshot {
        ProductSnapshot::new(id, id.to_uppercase(), Some(price))
    }

    #[tokio::test]
    async fn voiding_one_member_reprices_the_whole_group() {
        let (engine, _, _) = engine();
        let offer = BundleOffer::new("bundle_bc", "B+C", 10.0);
        engine
            .add_bundle_to_cart(&offer, vec![product("b", 50.0), product("c", 50.0)])
            .await
            .unwrap();
        assert_eq!(engine.get_cart_subtotal(), 90.0);

        assert!(engine.remove_from_cart(&"b".into(), true).await);

        let items = engine.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_id.as_str(), "c");
        assert_eq!(items[0].discounted_price, Some(50.0));
        assert!(!items[0].is_bundled());
        assert!(items[0].bundle_offer_id.is_none());
        assert_eq!(engine.get_cart_subtotal(), 50.0);
    }

    #[tokio::test]
    async fn removing_without_void_keeps_group_discount() {
        let (engine, _, _) = engine();
        let offer = BundleOffer::new("bundle_bc", "B+C", 10.0);
        engine
            .add_bundle_to_cart(&offer, vec![product("b", 50.0), product("c", 50.0)])
            .await
            .unwrap();

        assert!(engine.remove_from_cart(&"b".into(), false).await);
        let items = engine.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].discounted_price, Some(45.0));
        assert!(items[0].is_bundled());
    }

    #[tokio::test]
    async fn bundle_lines_share_one_fresh_group() {
        let (engine, remote, _) = engine();
        let offer = BundleOffer::new("bundle_kit", "Kit", 20.0);
        let products = vec![product("p1", 10.0), product("p2", 20.0), product("p3", 30.0)];

        let first = engine.add_bundle_to_cart(&offer, products.clone()).await.unwrap();
        let second = engine.add_bundle_to_cart(&offer, products).await.unwrap();
        assert_ne!(first, second);

        let groups = engine.get_bundle_groups();
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.items.len() == 3));
        assert_eq!(groups[0].items[2].discounted_price, Some(24.0));
        assert_eq!(remote.requests_to(HttpMethod::Post, "/cart/add").len(), 6);

        assert_eq!(engine.void_bundle_discount(&first).await, 3);
        assert_eq!(engine.get_bundle_groups().len(), 1);
        assert_eq!(engine.items().len(), 6);
    }

    #[tokio::test]
    async fn invalid_bundle_is_rejected_before_any_change() {
        let (engine, remote, _) = engine();
        let bad = BundleOffer::new("bundle_bad", "Bad", 150.0);
        assert!(engine.add_bundle_to_cart(&bad, vec![product("p1", 1.0)]).await.is_err());

        let empty = BundleOffer::new("bundle_empty", "Empty", 5.0);
        assert!(engine.add_bundle_to_cart(&empty, Vec::new()).await.is_err());

        assert!(engine.items().is_empty());
        assert!(engine.state().last_snapshot.is_none());
        assert!(remote.requests().is_empty());
    }

    #[tokio::test]
    async fn offline_mirror_failures_are_queued_not_rolled_back() {
        let (engine, remote, queue) = engine();
        remote.set_offline(true);
        let offer = BundleOffer::new("bundle_kit", "Kit", 10.0);

        engine
            .add_bundle_to_cart(&offer, vec![product("p1", 10.0), product("p2", 20.0)])
            .await
            .unwrap();

        assert_eq!(engine.items().len(), 2);
        let actions = queue.read(|q| q.actions().to_vec());
        assert_eq!(actions.len(), 2);
        assert!(actions.iter().all(|a| a.endpoint == "/cart/add"));

        let sent: Vec<_> = remote
            .requests()
            .into_iter()
            .filter_map(|r| r.idempotency_key)
            .collect();
        let queued: Vec<_> = actions.iter().map(|a| a.id.to_string()).collect();
        assert_eq!(sent, queued);

        assert!(engine.restore_snapshot());
        assert!(engine.items().is_empty());
    }

    #[tokio::test]
    async fn adding_same_product_merges_quantity() {
        let (engine, _, _) = engine();
        engine.add_to_cart(product("p1", 5.0), 1).await;
        engine.add_to_cart(product("p1", 5.0), 2).await;
        engine.add_to_cart(product("p1", 5.0), 0).await;

        let items = engine.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 3);
        assert_eq!(items[0].version, 2);
        assert_eq!(engine.get_cart_subtotal(), 15.0);
    }

    #[tokio::test]
    async fn update_to_zero_removes_line() {
        let (engine, remote, _) = engine();
        engine.add_to_cart(product("p1", 5.0), 1).await;

        assert!(engine.update_cart_item(&"p1".into(), 4).await);
        assert_eq!(engine.item_count(), 4);
        assert!(engine.update_cart_item(&"p1".into(), 0).await);
        assert!(engine.items().is_empty());
        assert!(!engine.update_cart_item(&"p1".into(), 2).await);

        let updates = remote.requests_to(HttpMethod::Put, "/cart/update");
        assert_eq!(updates.len(), 2);
    }

    #[tokio::test]
    async fn sync_failure_keeps_local_cart_and_records_error() {
        let (engine, remote, _) = engine();
        engine.add_to_cart(product("p1", 5.0), 1).await;
        remote.fail_next(RemoteError::Network("reset".into()));

        assert!(!engine.sync_with_server().await);
        assert_eq!(engine.items().len(), 1);
        assert!(!engine.is_loading());
        assert!(engine.last_error().is_some());
    }

    #[tokio::test]
    async fn sync_replaces_cart_with_server_lines() {
        let (engine, remote, _) = engine();
        engine.add_to_cart(product("local", 5.0), 1).await;
        remote.set_cart(
            serde_json::from_value(serde_json::json!({
                "items": [{"product_id": "srv", "quantity": 2, "final_unit_price": 3.0}]
            }))
            .unwrap(),
        );

        assert!(engine.sync_with_server().await);
        let items = engine.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_id.as_str(), "srv");
        assert_eq!(engine.get_cart_subtotal(), 6.0);
        assert!(engine.last_error().is_none());

        assert!(engine.restore_snapshot());
        assert_eq!(engine.items()[0].product_id.as_str(), "local");
    }

    #[tokio::test]
    async fn clear_cart_mirrors_delete() {
        let (engine, remote, _) = engine();
        engine.add_to_cart(product("p1", 5.0), 1).await;
        engine.clear_cart().await;
        assert!(engine.items().is_empty());
        assert_eq!(remote.requests_to(HttpMethod::Delete, "/cart/clear").len(), 1);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Add(u8, u32),
            Update(u8, i64),
        }

        fn catalog() -> Vec<String> {
            (0..6).map(|i| format!("p{i}")).collect()
        }

        fn lines_in(items: &[CartItem], group: &BundleGroupId) -> usize {
            items
                .iter()
                .filter(|i| i.bundle_group_id.as_ref() == Some(group))
                .count()
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0u8..4, 1u32..5).prop_map(|(p, q)| Op::Add(p, q)),
                (0u8..4, -1i64..5).prop_map(|(p, q)| Op::Update(p, q)),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 64,
                ..ProptestConfig::default()
            })]

            /// Property: the cart quantity always equals the model's per-product sum.
            #[test]
            fn quantity_matches_model(ops in proptest::collection::vec(op(), 0..25)) {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .build()
                    .unwrap();
                let (engine, _, _) = engine();
                let mut model = std::collections::BTreeMap::<u8, u64>::new();

                for op in ops {
                    match op {
                        Op::Add(p, q) => {
                            runtime.block_on(engine.add_to_cart(product(&format!("p{p}"), 1.0), q));
                            *model.entry(p).or_default() += u64::from(q);
                        }
                        Op::Update(p, q) => {
                            let id = RecordId::new(format!("p{p}"));
                            runtime.block_on(engine.update_cart_item(&id, q));
                            if model.contains_key(&p) {
                                if q <= 0 {
                                    model.remove(&p);
                                } else {
                                    model.insert(p, q as u64);
                                }
                            }
                        }
                    }
                }

                let lines: u64 = engine.items().iter().map(|i| u64::from(i.quantity)).sum();
                prop_assert_eq!(engine.item_count(), model.values().sum::<u64>());
                prop_assert_eq!(lines, engine.item_count());
            }

            /// Property: a bundle of N products adds exactly N lines under one
            /// fresh group, and voiding it clears exactly those N lines.
            #[test]
            fn bundle_add_and_void_touch_exactly_one_group(
                plain in proptest::collection::vec((0usize..6, 1u32..4), 0..6),
                earlier in proptest::sample::subsequence(catalog(), 0..=3),
                members in proptest::sample::subsequence(catalog(), 1..=6),
                discount in 0.0f64..=100.0,
            ) {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .build()
                    .unwrap();
                let (engine, _, _) = engine();

                for (p, q) in &plain {
                    runtime.block_on(engine.add_to_cart(product(&format!("p{p}"), 10.0), *q));
                }
                let mut other_groups = Vec::new();
                if !earlier.is_empty() {
                    let offer = BundleOffer::new("bundle_earlier", "Earlier", 5.0);
                    let products = earlier.iter().map(|id| product(id, 20.0)).collect();
                    other_groups.push(runtime.block_on(engine.add_bundle_to_cart(&offer, products)).unwrap());
                }

                let before = engine.items();
                let offer = BundleOffer::new("bundle_new", "New", discount);
                let products = members.iter().map(|id| product(id, 30.0)).collect();
                let group = runtime.block_on(engine.add_bundle_to_cart(&offer, products)).unwrap();
                prop_assert!(!other_groups.contains(&group));

                let after_add = engine.items();
                prop_assert_eq!(after_add.len(), before.len() + members.len());
                prop_assert_eq!(&after_add[..before.len()], &before[..]);
                prop_assert_eq!(lines_in(&after_add, &group), members.len());
                prop_assert!(after_add
                    .iter()
                    .filter(|i| i.bundle_group_id.as_ref() == Some(&group))
                    .all(|i| i.quantity == 1
                        && i.bundle_offer_id.as_ref() == Some(&offer.id)
                        && i.bundle_discount == Some(discount)));

                let folds = members
                    .iter()
                    .filter(|id| {
                        before
                            .iter()
                            .any(|i| i.product_id.as_str() == id.as_str() && i.bundle_group_id.is_none())
                    })
                    .count();
                let quantity = engine.item_count();

                let voided = runtime.block_on(engine.void_bundle_discount(&group));
                prop_assert_eq!(voided, members.len());

                let after_void = engine.items();
                prop_assert_eq!(after_void.len(), after_add.len() - folds);
                prop_assert_eq!(engine.item_count(), quantity);
                prop_assert_eq!(lines_in(&after_void, &group), 0);
                for other in &other_groups {
                    prop_assert_eq!(lines_in(&after_void, other), lines_in(&after_add, other));
                }
                for id in &members {
                    let plain_lines: Vec<_> = after_void
                        .iter()
                        .filter(|i| i.product_id.as_str() == id.as_str() && i.bundle_group_id.is_none())
                        .collect();
                    prop_assert_eq!(plain_lines.len(), 1);
                    prop_assert!(plain_lines[0].bundle_offer_id.is_none());
                    prop_assert!(plain_lines[0].bundle_discount.is_none());
                }

                let mut seen = std::collections::HashSet::new();
                prop_assert!(after_void
                    .iter()
                    .all(|i| seen.insert((i.product_id.clone(), i.bundle_group_id.clone()))));
            }
        }
    }
}
