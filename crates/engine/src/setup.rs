//! Building the collaborators an `OfflineStore` needs from configuration.

use std::sync::Arc;

use storefront_storage::{KeyValueStore, SqliteKeyValueStore, StorageError};

use crate::config::EngineConfig;

/// SQLite store at `config.db_path`, or in the OS data directory.
pub async fn open_storage(config: &EngineConfig) -> Result<Arc<dyn KeyValueStore>, StorageError> {
    let store = match &config.db_path {
        Some(path) => SqliteKeyValueStore::open(path).await?,
        None => SqliteKeyValueStore::open_default().await?,
    };
    Ok(Arc::new(store))
}

/// HTTP client for `config.api_base_url`, if one is configured.
#[cfg(feature = "http")]
pub fn http_remote(config: &EngineConfig, token: Option<String>) -> Option<storefront_remote::HttpRemote> {
    let base_url = config.api_base_url.as_deref()?;
    let mut remote = storefront_remote::HttpRemote::new(base_url);
    remote.set_token(token);
    Some(remote)
}
