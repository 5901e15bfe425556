//! JSON helpers over a `KeyValueStore`.

use serde::de::DeserializeOwned;

use crate::store::KeyValueStore;

/// Load and decode a JSON value, failing closed to `T::default()`.
///
/// A missing key, a backend error and a malformed payload all yield the
/// default; the latter two are logged.
pub async fn load_or_default<T>(store: &dyn KeyValueStore, namespace: &str, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let raw = match store.get(namespace, key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(err) => {
            tracing::error!(namespace, key, error = %err, "failed to read persisted state; starting empty");
            return T::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(namespace, key, error = %err, "discarding malformed persisted state");
            T::default()
        }
    }
}
