//! Cart engine.
//!
//! Every mutation lands in local state first and is then mirrored to the
//! remote cart. A mirror call that fails is turned into an offline action
//! instead of undoing the local change.

pub mod bundle;
pub mod engine;
pub mod item;
pub mod pricing;
pub mod server;
pub mod state;

pub use bundle::BundleGroup;
pub use engine::CartEngine;
pub use item::CartItem;
pub use pricing::{CartTotals, discounted_unit_price, original_unit_price, resolve_unit_price, round2};
pub use state::{CartSnapshot, CartState};
