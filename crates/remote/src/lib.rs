//! Contract with the remote commerce service.
//!
//! The store never talks HTTP directly: every call goes through
//! `RemoteService`, and every call the store may have to replay later is
//! expressed as a self-contained `RemoteRequest` (endpoint + verb + body).

pub mod cart;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod memory;
pub mod request;
pub mod service;

pub use cart::{CartAddBody, CartUpdateBody, DiscountDetails, ServerCart, ServerCartItem};
pub use error::RemoteError;
#[cfg(feature = "http")]
pub use http::HttpRemote;
pub use memory::InMemoryRemote;
pub use request::{HttpMethod, RemoteRequest};
pub use service::RemoteService;
