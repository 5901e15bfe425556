//! In-memory key/value store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::store::KeyValueStore;

/// Process-local store, used in tests and when no database is configured.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    entries: RwLock<HashMap<(String, String), String>>,
    fail_writes: AtomicBool,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `put`/`remove` fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }

    async fn put(&self, namespace: &str, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_writable()?;
        let mut entries = self.entries.write().await;
        entries.insert((namespace.to_string(), key.to_string()), value.to_string());
        Ok(())
    }

    async fn remove(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.check_writable()?;
        let mut entries = self.entries.write().await;
        entries.remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn namespaces_are_independent() {
        let store = InMemoryKeyValueStore::new();
        store.put("cache", "state", "1").await.unwrap();
        store.put("cart", "state", "2").await.unwrap();

        assert_eq!(store.get("cache", "state").await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.get("cart", "state").await.unwrap().as_deref(), Some("2"));

        store.remove("cache", "state").await.unwrap();
        assert!(store.get("cache", "state").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failing_writes_leave_previous_value() {
        let store = InMemoryKeyValueStore::new();
        store.put("cart", "state", "old").await.unwrap();
        store.set_fail_writes(true);
        assert!(store.put("cart", "state", "new").await.is_err());
        assert_eq!(store.get("cart", "state").await.unwrap().as_deref(), Some("old"));
    }
}
