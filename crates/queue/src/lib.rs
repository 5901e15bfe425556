//! Offline action queue.
//!
//! A durable FIFO log of mutations the remote service has not confirmed yet.
//! The queue only records; it never sends, retries or schedules anything on
//! its own. Whoever drains it reports outcomes back through
//! `update_status` / `record_failure` / `remove`.

pub mod action;
pub mod queue;

pub use action::{ActionDraft, ActionPayload, ActionStatus, MutationPayload, OfflineAction};
pub use queue::{ActionQueue, ActionStatusPatch};
