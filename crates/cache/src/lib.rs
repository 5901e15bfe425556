//! Local mirror of server-owned collections.
//!
//! - `EntityCache`: one `CachedCollection<Record>` per resource type, with
//!   zero-waste purge and delta application
//! - `SnapshotManager`: bounded rollback points over the tracked collections
//! - `VersionTracker`: per-resource optimistic-concurrency bookkeeping

pub mod collection;
pub mod entity_cache;
pub mod snapshot;
pub mod versions;

pub use collection::CachedCollection;
pub use entity_cache::{DeltaReport, EntityCache, PurgeReport};
pub use snapshot::{DataSnapshot, SnapshotManager};
pub use versions::{ConflictResolution, ResourceVersion, VersionTracker};
