//! Server-owned catalog shapes as the client mirrors them.
//!
//! Records arrive as loosely-shaped JSON documents; the cache keeps them as
//! `Record`s and only the cart needs typed views (`ProductSnapshot`,
//! `BundleOffer`).

pub mod offer;
pub mod product;
pub mod record;
pub mod resource;

pub use offer::BundleOffer;
pub use product::ProductSnapshot;
pub use record::{Patch, Record};
pub use resource::ResourceType;
