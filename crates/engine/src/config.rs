//! Engine configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::Duration;
use serde::Deserialize;
use storefront_catalog::ResourceType;

/// Tunables of the offline store. Every field has a default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Snapshots kept in memory.
    pub max_snapshots: usize,
    /// Newest snapshots written to disk.
    pub persisted_snapshots: usize,
    pub queue_max_age_days: i64,
    /// Failed actions with at least this many retries are purged.
    pub queue_max_retries: u32,
    /// Retry budget of actions queued by the cart.
    pub default_action_max_retries: u32,
    pub version_retention_hours: i64,
    /// Collections written to disk, with their size caps. Operational
    /// collections are never written regardless of this map.
    pub persist_limits: BTreeMap<ResourceType, usize>,
    pub api_base_url: Option<String>,
    pub db_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_snapshots: 5,
            persisted_snapshots: 2,
            queue_max_age_days: 3,
            queue_max_retries: 5,
            default_action_max_retries: 3,
            version_retention_hours: 24,
            persist_limits: BTreeMap::from([
                (ResourceType::Products, 100),
                (ResourceType::Categories, 100),
                (ResourceType::CarBrands, 50),
                (ResourceType::CarModels, 100),
                (ResourceType::ProductBrands, 50),
            ]),
            api_base_url: None,
            db_path: None,
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with `STOREFRONT_*` environment variables.
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        overlay(&lookup, "STOREFRONT_MAX_SNAPSHOTS", &mut config.max_snapshots);
        overlay(&lookup, "STOREFRONT_PERSISTED_SNAPSHOTS", &mut config.persisted_snapshots);
        overlay(&lookup, "STOREFRONT_QUEUE_MAX_AGE_DAYS", &mut config.queue_max_age_days);
        overlay(&lookup, "STOREFRONT_QUEUE_MAX_RETRIES", &mut config.queue_max_retries);
        overlay(
            &lookup,
            "STOREFRONT_ACTION_MAX_RETRIES",
            &mut config.default_action_max_retries,
        );
        overlay(
            &lookup,
            "STOREFRONT_VERSION_RETENTION_HOURS",
            &mut config.version_retention_hours,
        );

        for resource_type in ResourceType::ALL {
            let name = format!(
                "STOREFRONT_PERSIST_LIMIT_{}",
                resource_type.as_str().to_uppercase()
            );
            let mut limit = config.persist_limits.get(&resource_type).copied().unwrap_or(0);
            if overlay(&lookup, &name, &mut limit) {
                config.persist_limits.insert(resource_type, limit);
            }
        }

        if let Some(url) = lookup("STOREFRONT_API_URL") {
            config.api_base_url = Some(url);
        }
        if let Some(path) = lookup("STOREFRONT_DB_PATH") {
            config.db_path = Some(PathBuf::from(path));
        }
        config
    }

    pub fn version_retention(&self) -> Duration {
        Duration::hours(self.version_retention_hours)
    }

    /// Size cap applied when persisting `resource_type`; `None` means the
    /// collection is not persisted.
    pub fn persist_limit(&self, resource_type: ResourceType) -> Option<usize> {
        if resource_type.is_operational() {
            return None;
        }
        self.persist_limits.get(&resource_type).copied()
    }
}

fn overlay<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, target: &mut T) -> bool {
    let Some(raw) = lookup(name) else {
        return false;
    };
    match raw.trim().parse() {
        Ok(value) => {
            *target = value;
            true
        }
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "ignoring unparseable configuration value");
            false
        }
    }
}
