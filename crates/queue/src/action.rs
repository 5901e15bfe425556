//! Queued action types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use storefront_catalog::ResourceType;
use storefront_core::{ActionId, BundleGroupId, RecordId};
use storefront_remote::cart::{clear_cart_request, void_bundle_request};
use storefront_remote::{CartAddBody, CartUpdateBody, HttpMethod, RemoteRequest};

/// Lifecycle of a queued action.
///
/// `pending → processing → (removed | pending | failed)`. Success removes the
/// action instead of giving it a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Pending,
    Processing,
    Failed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::Processing => "processing",
            ActionStatus::Failed => "failed",
        }
    }

    /// Still waiting to reach the server.
    pub fn is_live(&self) -> bool {
        matches!(self, ActionStatus::Pending | ActionStatus::Processing)
    }
}

/// Mutations this version of the client knows how to describe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum MutationPayload {
    CartAdd(CartAddBody),
    CartUpdate(CartUpdateBody),
    CartVoidBundle {
        bundle_group_id: BundleGroupId,
    },
    CartClear,
    ResourceCreate {
        resource_type: ResourceType,
        body: Value,
    },
    ResourceUpdate {
        resource_type: ResourceType,
        id: RecordId,
        patch: Map<String, Value>,
    },
    ResourceDelete {
        resource_type: ResourceType,
        id: RecordId,
    },
}

impl MutationPayload {
    /// Request that carries this mutation to the remote service.
    pub fn to_request(&self) -> RemoteRequest {
        match self {
            MutationPayload::CartAdd(body) => body.to_request(),
            MutationPayload::CartUpdate(body) => body.to_request(),
            MutationPayload::CartVoidBundle { bundle_group_id } => {
                void_bundle_request(bundle_group_id)
            }
            MutationPayload::CartClear => clear_cart_request(),
            MutationPayload::ResourceCreate {
                resource_type,
                body,
            } => RemoteRequest::new(HttpMethod::Post, resource_type.endpoint(), Some(body.clone())),
            MutationPayload::ResourceUpdate {
                resource_type,
                id,
                patch,
            } => RemoteRequest::new(
                HttpMethod::Put,
                format!("{}/{}", resource_type.endpoint(), id),
                Some(Value::Object(patch.clone())),
            ),
            MutationPayload::ResourceDelete { resource_type, id } => RemoteRequest::new(
                HttpMethod::Delete,
                format!("{}/{}", resource_type.endpoint(), id),
                None,
            ),
        }
    }

    pub fn body(&self) -> Option<Value> {
        self.to_request().body
    }
}

/// Payload of a queued action.
///
/// Payloads written by a newer client version that this one cannot parse are
/// kept as `Opaque` and still replayed verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionPayload {
    Mutation(MutationPayload),
    Opaque(Value),
}

impl ActionPayload {
    /// JSON body to resubmit.
    pub fn body(&self) -> Option<Value> {
        match self {
            ActionPayload::Mutation(mutation) => mutation.body(),
            ActionPayload::Opaque(Value::Null) => None,
            ActionPayload::Opaque(value) => Some(value.clone()),
        }
    }
}

impl From<MutationPayload> for ActionPayload {
    fn from(value: MutationPayload) -> Self {
        ActionPayload::Mutation(value)
    }
}

/// A recorded mutation intent awaiting confirmed delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineAction {
    pub id: ActionId,
    #[serde(rename = "type")]
    pub action_type: String,
    pub endpoint: String,
    pub method: HttpMethod,
    pub payload: ActionPayload,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub retry_count: u32,
    pub max_retries: u32,
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<ResourceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_version: Option<u64>,
}

impl OfflineAction {
    /// Request to resubmit, keyed by the action id for server-side dedup.
    pub fn to_request(&self) -> RemoteRequest {
        RemoteRequest::new(self.method, self.endpoint.clone(), self.payload.body())
            .with_idempotency_key(self.id.to_string())
    }

    pub fn retries_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }
}

/// Everything the caller supplies when queuing an action; the queue fills in
/// id, timestamp, retry count and status.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionDraft {
    pub action_type: String,
    pub endpoint: String,
    pub method: HttpMethod,
    pub payload: ActionPayload,
    pub resource_id: Option<RecordId>,
    pub resource_type: Option<ResourceType>,
    pub local_version: Option<u64>,
    pub max_retries: u32,
}

impl ActionDraft {
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    pub fn new(
        action_type: impl Into<String>,
        endpoint: impl Into<String>,
        method: HttpMethod,
        payload: ActionPayload,
    ) -> Self {
        Self {
            action_type: action_type.into(),
            endpoint: endpoint.into(),
            method,
            payload,
            resource_id: None,
            resource_type: None,
            local_version: None,
            max_retries: Self::DEFAULT_MAX_RETRIES,
        }
    }

    /// Draft whose endpoint and verb are derived from a known mutation.
    pub fn mutation(action_type: impl Into<String>, mutation: MutationPayload) -> Self {
        let request = mutation.to_request();
        Self::new(action_type, request.endpoint, request.method, mutation.into())
    }

    pub fn for_resource(mut self, resource_type: ResourceType, resource_id: RecordId) -> Self {
        self.resource_type = Some(resource_type);
        self.resource_id = Some(resource_id);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_local_version(mut self, version: u64) -> Self {
        self.local_version = Some(version);
        self
    }
}
