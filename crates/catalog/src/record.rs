//! Generic cached record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use storefront_core::{Entity, RecordId};

/// Shallow field patch (top-level keys replace existing values).
pub type Patch = Map<String, Value>;

/// One server document mirrored locally.
///
/// `id` is the identity; everything else the server sent is kept verbatim in
/// `fields`. `local_modified_at` is stamped when the record is edited locally
/// and is never sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    local_modified_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            local_modified_at: None,
            fields: Map::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Parse a server document; `None` if it has no usable `id`.
    pub fn from_value(value: Value) -> Option<Self> {
        match serde_json::from_value::<Record>(value) {
            Ok(record) if !record.id.as_str().is_empty() => Some(record),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(error = %err, "discarding server document without a string id");
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn local_modified_at(&self) -> Option<DateTime<Utc>> {
        self.local_modified_at
    }

    /// Shallow-merge `patch` into the record and stamp `local_modified_at`.
    ///
    /// `id` and `local_modified_at` keys in the patch are ignored: identity is
    /// immutable and the stamp is owned by the cache.
    pub fn apply_patch(&mut self, patch: &Patch, now: DateTime<Utc>) {
        for (key, value) in patch {
            if key == "id" || key == "local_modified_at" {
                continue;
            }
            self.fields.insert(key.clone(), value.clone());
        }
        self.local_modified_at = Some(now);
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Entity for Record {
    type Id = RecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
