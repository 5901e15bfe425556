//! `storefront-engine` — the offline store service object.
//!
//! `OfflineStore` owns the entity cache, action queue, snapshots, version
//! tracker and cart; hydrates them from persisted state on `init`; writes
//! them back after every change; and tears down explicitly on `shutdown`.

pub mod config;
pub mod persist;
pub mod replay;
pub mod setup;
pub mod store;
pub mod sync;

pub use config::EngineConfig;
pub use persist::{PersistedCacheState, PersistedCartState};
pub use replay::ReplayReport;
pub use setup::open_storage;
pub use store::OfflineStore;
pub use sync::SyncStatus;

pub use storefront_observability::init as init_tracing;
