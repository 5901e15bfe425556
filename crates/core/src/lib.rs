//! `storefront-core` — building blocks shared by every store component.
//!
//! This crate contains **no IO**: identifiers, the error model, time, and the
//! small pieces of plumbing (shared state handle, change observers) the
//! stores are assembled from.

pub mod clock;
pub mod entity;
pub mod error;
pub mod id;
pub mod observer;
pub mod shared;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entity::Entity;
pub use error::{StoreError, StoreResult};
pub use id::{ActionId, BundleGroupId, RecordId, SnapshotId};
pub use observer::{ChangeEvent, ObserverId, Observers};
pub use shared::Shared;
