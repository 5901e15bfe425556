//! Key/value store abstraction.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StorageError;

/// Namespaced string key/value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StorageError>;

    async fn put(&self, namespace: &str, key: &str, value: &str) -> Result<(), StorageError>;

    async fn remove(&self, namespace: &str, key: &str) -> Result<(), StorageError>;
}

#[async_trait]
impl<S> KeyValueStore for Arc<S>
where
    S: KeyValueStore + ?Sized,
{
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(namespace, key).await
    }

    async fn put(&self, namespace: &str, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).put(namespace, key, value).await
    }

    async fn remove(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        (**self).remove(namespace, key).await
    }
}
