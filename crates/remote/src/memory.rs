//! In-memory remote service for tests/dev.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::cart::{CART_PATH, ServerCart};
use crate::error::RemoteError;
use crate::request::{HttpMethod, RemoteRequest};
use crate::service::RemoteService;

/// Scriptable fake of the commerce service.
///
/// - No IO
/// - Records every attempted request, successful or not
/// - Failures are scripted: offline switch, one-shot failures, or a
///   persistent failure for an endpoint prefix
#[derive(Debug, Default)]
pub struct InMemoryRemote {
    offline: AtomicBool,
    next_failures: Mutex<VecDeque<RemoteError>>,
    failing_endpoints: Mutex<Vec<(String, RemoteError)>>,
    cart: Mutex<ServerCart>,
    sent: Mutex<Vec<RemoteRequest>>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fail the next call (regardless of endpoint) with `error`.
    pub fn fail_next(&self, error: RemoteError) {
        lock(&self.next_failures).push_back(error);
    }

    /// Fail every call whose endpoint starts with `prefix`.
    pub fn fail_endpoint(&self, prefix: impl Into<String>, error: RemoteError) {
        lock(&self.failing_endpoints).push((prefix.into(), error));
    }

    pub fn clear_failures(&self) {
        lock(&self.next_failures).clear();
        lock(&self.failing_endpoints).clear();
    }

    /// Cart returned by `GET /cart`.
    pub fn set_cart(&self, cart: ServerCart) {
        *lock(&self.cart) = cart;
    }

    pub fn requests(&self) -> Vec<RemoteRequest> {
        lock(&self.sent).clone()
    }

    pub fn requests_to(&self, method: HttpMethod, endpoint_prefix: &str) -> Vec<RemoteRequest> {
        lock(&self.sent)
            .iter()
            .filter(|r| r.method == method && r.endpoint.starts_with(endpoint_prefix))
            .cloned()
            .collect()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl RemoteService for InMemoryRemote {
    async fn send(&self, request: RemoteRequest) -> Result<Value, RemoteError> {
        lock(&self.sent).push(request.clone());

        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Offline);
        }

        if let Some(error) = lock(&self.next_failures).pop_front() {
            return Err(error);
        }

        if let Some((_, error)) = lock(&self.failing_endpoints)
            .iter()
            .find(|(prefix, _)| request.endpoint.starts_with(prefix.as_str()))
        {
            return Err(error.clone());
        }

        if request.method == HttpMethod::Get && request.endpoint == CART_PATH {
            let cart = lock(&self.cart).clone();
            return serde_json::to_value(cart).map_err(|e| RemoteError::Parse(e.to_string()));
        }

        Ok(json!({ "message": "ok" }))
    }
}
