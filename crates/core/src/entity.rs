//! Identity of cached values.

use core::fmt::Debug;
use core::hash::Hash;

/// Anything that lives in a keyed collection.
///
/// Collections use the id for uniqueness, so two values with the same id are
/// the same entity even if every other field differs.
pub trait Entity {
    type Id: Clone + Eq + Hash + Debug;

    fn id(&self) -> &Self::Id;
}
