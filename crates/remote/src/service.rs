//! The remote service trait.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::cart::{ServerCart, fetch_cart_request};
use crate::error::RemoteError;
use crate::request::RemoteRequest;

/// Upstream commerce service.
///
/// Implementations perform exactly one attempt per call. Timeouts, retries
/// and backoff are decided by whoever drives the offline queue.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Issue one request and return the decoded JSON body (`Null` if empty).
    async fn send(&self, request: RemoteRequest) -> Result<Value, RemoteError>;

    /// Fetch the authoritative cart.
    async fn fetch_cart(&self) -> Result<ServerCart, RemoteError> {
        let body = self.send(fetch_cart_request()).await?;
        serde_json::from_value(body).map_err(|e| RemoteError::Parse(e.to_string()))
    }
}

#[async_trait]
impl<S> RemoteService for Arc<S>
where
    S: RemoteService + ?Sized,
{
    async fn send(&self, request: RemoteRequest) -> Result<Value, RemoteError> {
        (**self).send(request).await
    }

    async fn fetch_cart(&self) -> Result<ServerCart, RemoteError> {
        (**self).fetch_cart().await
    }
}
