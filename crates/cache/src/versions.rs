//! Per-resource optimistic-concurrency bookkeeping.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use storefront_catalog::ResourceType;
use storefront_core::RecordId;

/// Locally tracked revision of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceVersion {
    pub resource_id: RecordId,
    pub resource_type: ResourceType,
    pub local_version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_version: Option<u64>,
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub has_conflict: bool,
}

/// Which side wins when a conflict is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictResolution {
    /// Keep the local version.
    Local,
    /// Adopt the server version.
    Server,
}

type VersionKey = (ResourceType, RecordId);

/// Versions keyed by `(resource_type, resource_id)`.
///
/// Serializes as a plain array of `ResourceVersion`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ResourceVersion>", into = "Vec<ResourceVersion>")]
pub struct VersionTracker {
    versions: BTreeMap<VersionKey, ResourceVersion>,
}

impl From<Vec<ResourceVersion>> for VersionTracker {
    fn from(versions: Vec<ResourceVersion>) -> Self {
        Self {
            versions: versions
                .into_iter()
                .map(|v| ((v.resource_type, v.resource_id.clone()), v))
                .collect(),
        }
    }
}

impl From<VersionTracker> for Vec<ResourceVersion> {
    fn from(tracker: VersionTracker) -> Self {
        tracker.versions.into_values().collect()
    }
}

impl VersionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a local edit. Keeps an existing conflict flag.
    pub fn track_version(
        &mut self,
        resource_id: RecordId,
        resource_type: ResourceType,
        version: u64,
        now: DateTime<Utc>,
    ) {
        self.versions
            .entry((resource_type, resource_id.clone()))
            .and_modify(|v| {
                v.local_version = version;
                v.last_modified = now;
            })
            .or_insert_with(|| ResourceVersion {
                resource_id,
                resource_type,
                local_version: version,
                server_version: None,
                last_modified: now,
                has_conflict: false,
            });
    }

    /// Compare the server's version against the tracked local one.
    ///
    /// Returns `false` when nothing is tracked. On mismatch the server
    /// version is stored and the entry is flagged; `local_version` is never
    /// touched.
    pub fn check_conflict(
        &mut self,
        resource_id: &RecordId,
        resource_type: ResourceType,
        server_version: u64,
    ) -> bool {
        let Some(entry) = self.versions.get_mut(&(resource_type, resource_id.clone())) else {
            return false;
        };
        if entry.local_version == server_version {
            return false;
        }

        entry.server_version = Some(server_version);
        entry.has_conflict = true;
        tracing::warn!(
            %resource_type,
            resource_id = %resource_id,
            local_version = entry.local_version,
            server_version,
            "version conflict detected"
        );
        true
    }

    /// Clear the conflict flag. `Server` adopts the stored server version.
    ///
    /// Returns `false` if nothing is tracked for the resource.
    pub fn resolve_conflict(
        &mut self,
        resource_id: &RecordId,
        resource_type: ResourceType,
        resolution: ConflictResolution,
    ) -> bool {
        let Some(entry) = self.versions.get_mut(&(resource_type, resource_id.clone())) else {
            return false;
        };

        if resolution == ConflictResolution::Server {
            if let Some(server_version) = entry.server_version {
                entry.local_version = server_version;
            }
        }
        entry.has_conflict = false;
        tracing::info!(%resource_type, resource_id = %resource_id, ?resolution, "conflict resolved");
        true
    }

    pub fn get(&self, resource_id: &RecordId, resource_type: ResourceType) -> Option<&ResourceVersion> {
        self.versions.get(&(resource_type, resource_id.clone()))
    }

    pub fn get_conflicts(&self) -> Vec<&ResourceVersion> {
        self.versions.values().filter(|v| v.has_conflict).collect()
    }

    /// Conflicted entries only, the subset worth persisting.
    pub fn conflicted_only(&self) -> Vec<ResourceVersion> {
        self.get_conflicts().into_iter().cloned().collect()
    }

    /// Drop unconflicted entries last modified more than `retention` ago.
    pub fn cleanup(&mut self, now: DateTime<Utc>, retention: Duration) -> usize {
        let before = self.versions.len();
        self.versions
            .retain(|_, v| v.has_conflict || now.signed_duration_since(v.last_modified) <= retention);
        before - self.versions.len()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn clear(&mut self) {
        self.versions.clear();
    }
}
