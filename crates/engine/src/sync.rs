//! Sync bookkeeping of the cache store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storefront_catalog::ResourceType;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub last_sync_time: Option<DateTime<Utc>>,
    /// Records received per type on the last pull.
    pub last_sync_results: BTreeMap<ResourceType, usize>,
    /// Last failure reported by a sync pass; never persisted.
    #[serde(skip)]
    pub last_error: Option<String>,
}

impl SyncStatus {
    pub fn record_success(&mut self, results: BTreeMap<ResourceType, usize>, now: DateTime<Utc>) {
        self.last_sync_time = Some(now);
        self.last_sync_results = results;
        self.last_error = None;
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }
}
