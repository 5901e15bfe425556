//! FIFO log of offline actions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use storefront_core::{ActionId, RecordId};

use crate::action::{ActionDraft, ActionStatus, OfflineAction};

/// Driver-facing partial update of an action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionStatusPatch {
    pub status: Option<ActionStatus>,
    pub retry_count: Option<u32>,
    /// `Some(None)` clears the message.
    pub error_message: Option<Option<String>>,
}

impl ActionStatusPatch {
    pub fn status(status: ActionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Insertion-ordered queue of actions. Never reorders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionQueue {
    actions: Vec<OfflineAction>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted actions, keeping their order.
    pub fn from_actions(actions: Vec<OfflineAction>) -> Self {
        Self { actions }
    }

    /// Append an action at the tail with `retry_count = 0`, `status = pending`.
    pub fn enqueue(&mut self, draft: ActionDraft, now: DateTime<Utc>) -> ActionId {
        self.enqueue_as(ActionId::new(), draft, now)
    }

    /// Like `enqueue`, but under an id the caller already used as the
    /// idempotency key of a failed direct call. A second enqueue under the
    /// same id is ignored.
    pub fn enqueue_as(&mut self, id: ActionId, draft: ActionDraft, now: DateTime<Utc>) -> ActionId {
        if self.get(id).is_some() {
            tracing::debug!(action_id = %id, "action already queued");
            return id;
        }

        let action = OfflineAction {
            id,
            action_type: draft.action_type,
            endpoint: draft.endpoint,
            method: draft.method,
            payload: draft.payload,
            timestamp: now,
            retry_count: 0,
            max_retries: draft.max_retries,
            status: ActionStatus::Pending,
            error_message: None,
            resource_id: draft.resource_id,
            resource_type: draft.resource_type,
            local_version: draft.local_version,
        };

        tracing::debug!(
            action_id = %id,
            action_type = %action.action_type,
            endpoint = %action.endpoint,
            method = %action.method,
            "queued offline action"
        );

        self.actions.push(action);
        id
    }

    /// Drop an action by id. Returns `false` if it was not queued.
    pub fn remove(&mut self, id: ActionId) -> bool {
        let before = self.actions.len();
        self.actions.retain(|a| a.id != id);
        self.actions.len() != before
    }

    /// Apply a driver-reported patch. Returns `false` if the id is unknown.
    pub fn update_status(&mut self, id: ActionId, patch: ActionStatusPatch) -> bool {
        let Some(action) = self.get_mut(id) else {
            return false;
        };
        if let Some(status) = patch.status {
            action.status = status;
        }
        if let Some(retry_count) = patch.retry_count {
            action.retry_count = retry_count;
        }
        if let Some(error_message) = patch.error_message {
            action.error_message = error_message;
        }
        true
    }

    pub fn mark_processing(&mut self, id: ActionId) -> bool {
        self.update_status(id, ActionStatusPatch::status(ActionStatus::Processing))
    }

    /// Hand an action that is still `processing` back to `pending`.
    ///
    /// Returns `false` if the id is unknown or the action already moved on.
    pub fn release(&mut self, id: ActionId) -> bool {
        match self.get_mut(id) {
            Some(action) if action.status == ActionStatus::Processing => {
                action.status = ActionStatus::Pending;
                true
            }
            _ => false,
        }
    }

    /// Put every `processing` action back to `pending`.
    ///
    /// Nothing is in flight right after hydration, so anything still marked
    /// `processing` there was cut off mid-delivery.
    pub fn requeue_in_flight(&mut self) -> usize {
        let mut requeued = 0;
        for action in self
            .actions
            .iter_mut()
            .filter(|a| a.status == ActionStatus::Processing)
        {
            action.status = ActionStatus::Pending;
            requeued += 1;
        }
        requeued
    }

    /// Record one failed delivery attempt.
    ///
    /// Increments `retry_count`; the action becomes `failed` once it reaches
    /// `max_retries`, otherwise it goes back to `pending`. Returns the new
    /// status, or `None` if the id is unknown.
    pub fn record_failure(&mut self, id: ActionId, error: impl Into<String>) -> Option<ActionStatus> {
        let action = self.get_mut(id)?;
        action.retry_count = action.retry_count.saturating_add(1);
        action.error_message = Some(error.into());
        action.status = if action.retries_exhausted() {
            ActionStatus::Failed
        } else {
            ActionStatus::Pending
        };

        if action.status == ActionStatus::Failed {
            tracing::warn!(
                action_id = %action.id,
                retry_count = action.retry_count,
                "offline action exhausted its retries"
            );
        }
        Some(action.status)
    }

    /// Evict aged and permanently failed actions.
    ///
    /// Removes actions older than `max_age_days`, and `failed` actions whose
    /// `retry_count >= max_retries`. Returns how many were removed.
    pub fn purge_stale(&mut self, now: DateTime<Utc>, max_age_days: i64, max_retries: u32) -> usize {
        let max_age = Duration::days(max_age_days);
        let before = self.actions.len();

        self.actions.retain(|a| {
            let too_old = now.signed_duration_since(a.timestamp) > max_age;
            let dead = a.status == ActionStatus::Failed && a.retry_count >= max_retries;
            !(too_old || dead)
        });

        let removed = before - self.actions.len();
        if removed > 0 {
            tracing::info!(removed, "purged stale offline actions");
        }
        removed
    }

    /// Drop everything that is neither `pending` nor `processing`.
    pub fn cleanup_after_sync(&mut self) -> usize {
        let before = self.actions.len();
        self.actions.retain(|a| a.status.is_live());
        before - self.actions.len()
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }

    pub fn get(&self, id: ActionId) -> Option<&OfflineAction> {
        self.actions.iter().find(|a| a.id == id)
    }

    fn get_mut(&mut self, id: ActionId) -> Option<&mut OfflineAction> {
        self.actions.iter_mut().find(|a| a.id == id)
    }

    /// All actions in submission order.
    pub fn actions(&self) -> &[OfflineAction] {
        &self.actions
    }

    /// Pending actions in submission order.
    pub fn pending(&self) -> impl Iterator<Item = &OfflineAction> {
        self.actions
            .iter()
            .filter(|a| a.status == ActionStatus::Pending)
    }

    /// Actions touching one resource, in submission order.
    pub fn for_resource<'a>(&'a self, resource_id: &'a RecordId) -> impl Iterator<Item = &'a OfflineAction> {
        self.actions
            .iter()
            .filter(move |a| a.resource_id.as_ref() == Some(resource_id))
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionPayload, MutationPayload};
    use serde_json::json;
    use storefront_catalog::ResourceType;
    use storefront_remote::{CartAddBody, HttpMethod};

    fn draft(product: &str) -> ActionDraft {
        ActionDraft::mutation(
            "cart_add",
            MutationPayload::CartAdd(CartAddBody::plain(RecordId::from(product), 1)),
        )
    }

    #[test]
    fn enqueue_assigns_defaults_and_appends() {
        let mut queue = ActionQueue::new();
        let now = Utc::now();
        let first = queue.enqueue(draft("p1"), now);
        let second = queue.enqueue(draft("p2").with_max_retries(7), now);

        assert_eq!(queue.len(), 2);
        let action = queue.get(first).unwrap();
        assert_eq!(action.retry_count, 0);
        assert_eq!(action.status, ActionStatus::Pending);
        assert_eq!(action.timestamp, now);
        assert_eq!(action.endpoint, "/cart/add");
        assert_eq!(queue.actions()[1].id, second);
        assert_eq!(queue.actions()[1].max_retries, 7);
    }

    #[test]
    fn enqueue_as_is_idempotent_per_id() {
        let mut queue = ActionQueue::new();
        let id = ActionId::new();
        assert_eq!(queue.enqueue_as(id, draft("p1"), Utc::now()), id);
        assert_eq!(queue.enqueue_as(id, draft("p1"), Utc::now()), id);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn remove_and_update_unknown_ids_are_noops() {
        let mut queue = ActionQueue::new();
        assert!(!queue.remove(ActionId::new()));
        assert!(!queue.update_status(ActionId::new(), ActionStatusPatch::default()));
        assert!(queue.record_failure(ActionId::new(), "boom").is_none());
    }

    #[test]
    fn record_failure_turns_terminal_on_exhaustion() {
        let mut queue = ActionQueue::new();
        let id = queue.enqueue(draft("p1").with_max_retries(2), Utc::now());

        assert_eq!(queue.record_failure(id, "timeout"), Some(ActionStatus::Pending));
        assert_eq!(queue.record_failure(id, "timeout"), Some(ActionStatus::Failed));
        let action = queue.get(id).unwrap();
        assert_eq!(action.retry_count, 2);
        assert_eq!(action.error_message.as_deref(), Some("timeout"));
    }

    #[test]
    fn purge_removes_aged_actions() {
        let mut queue = ActionQueue::new();
        let now = Utc::now();
        queue.enqueue(draft("p1"), now - Duration::days(4));
        queue.enqueue(draft("p2"), now);

        assert_eq!(queue.purge_stale(now, 3, 5), 1);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn purge_keeps_pending_actions_below_the_retry_limit() {
        let mut queue = ActionQueue::new();
        let now = Utc::now();
        let id = queue.enqueue(draft("p1"), now);
        queue.update_status(
            id,
            ActionStatusPatch {
                retry_count: Some(9),
                ..ActionStatusPatch::default()
            },
        );
        assert_eq!(queue.purge_stale(now, 3, 5), 0);

        let failed = queue.enqueue(draft("p2"), now);
        queue.update_status(
            failed,
            ActionStatusPatch {
                status: Some(ActionStatus::Failed),
                retry_count: Some(5),
                error_message: Some(Some("gone".into())),
            },
        );
        assert_eq!(queue.purge_stale(now, 3, 5), 1);
        assert!(queue.get(id).is_some());
        assert!(queue.get(failed).is_none());
    }

    #[test]
    fn cleanup_after_sync_keeps_live_actions() {
        let mut queue = ActionQueue::new();
        let now = Utc::now();
        let pending = queue.enqueue(draft("p1"), now);
        let processing = queue.enqueue(draft("p2"), now);
        let failed = queue.enqueue(draft("p3"), now);
        queue.mark_processing(processing);
        queue.update_status(failed, ActionStatusPatch::status(ActionStatus::Failed));

        assert_eq!(queue.cleanup_after_sync(), 1);
        let ids: Vec<_> = queue.actions().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![pending, processing]);
    }

    #[test]
    fn in_flight_actions_go_back_to_pending() {
        let mut queue = ActionQueue::new();
        let now = Utc::now();
        let first = queue.enqueue(draft("p1"), now);
        let second = queue.enqueue(draft("p2"), now);
        let failed = queue.enqueue(draft("p3"), now);
        queue.mark_processing(first);
        queue.mark_processing(second);
        queue.update_status(failed, ActionStatusPatch::status(ActionStatus::Failed));

        assert!(queue.release(first));
        assert!(!queue.release(first));
        assert!(!queue.release(failed));
        assert_eq!(queue.get(first).unwrap().status, ActionStatus::Pending);

        assert_eq!(queue.requeue_in_flight(), 1);
        let pending: Vec<_> = queue.pending().map(|a| a.id).collect();
        assert_eq!(pending, vec![first, second]);
        assert_eq!(queue.get(failed).unwrap().status, ActionStatus::Failed);
    }

    #[test]
    fn resource_actions_keep_submission_order() {
        let mut queue = ActionQueue::new();
        let now = Utc::now();
        let target = RecordId::from("p1");
        let make = |v: u64| {
            ActionDraft::new(
                "update_product",
                "/products/p1",
                HttpMethod::Put,
                ActionPayload::Opaque(json!({"v": v})),
            )
            .for_resource(ResourceType::Products, target.clone())
            .with_local_version(v)
        };
        queue.enqueue(make(1), now);
        queue.enqueue(draft("other"), now);
        queue.enqueue(make(2), now);

        let versions: Vec<_> = queue.for_resource(&target).map(|a| a.local_version).collect();
        assert_eq!(versions, vec![Some(1), Some(2)]);
    }

    #[test]
    fn replay_request_carries_idempotency_key() {
        let mut queue = ActionQueue::new();
        let id = queue.enqueue(draft("p1"), Utc::now());
        let request = queue.get(id).unwrap().to_request();
        assert_eq!(request.idempotency_key, Some(id.to_string()));
        assert_eq!(request.body, Some(json!({"product_id": "p1", "quantity": 1})));
    }

    #[test]
    fn persisted_queue_is_a_plain_array() {
        let mut queue = ActionQueue::new();
        queue.enqueue(draft("p1"), Utc::now());
        let json = serde_json::to_value(&queue).unwrap();
        assert!(json.is_array());
        let restored: ActionQueue = serde_json::from_value(json).unwrap();
        assert_eq!(restored, queue);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: removals never reorder the remaining actions.
            #[test]
            fn removal_preserves_relative_order(
                count in 1usize..30,
                remove_mask in proptest::collection::vec(any::<bool>(), 30)
            ) {
                let mut queue = ActionQueue::new();
                let now = Utc::now();
                let ids: Vec<_> = (0..count)
                    .map(|i| queue.enqueue(draft(&format!("p{i}")), now))
                    .collect();

                for (id, remove) in ids.iter().zip(remove_mask.iter()) {
                    if *remove {
                        queue.remove(*id);
                    }
                }

                let expected: Vec<_> = ids
                    .iter()
                    .zip(remove_mask.iter())
                    .filter(|(_, remove)| !**remove)
                    .map(|(id, _)| *id)
                    .collect();
                let actual: Vec<_> = queue.actions().iter().map(|a| a.id).collect();
                prop_assert_eq!(actual, expected);
            }
        }
    }
}
