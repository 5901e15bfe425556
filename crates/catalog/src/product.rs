//! Product snapshot carried by cart items.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use storefront_core::{Entity, RecordId};

use crate::record::Record;

/// Point-in-time copy of a catalog product as the cart saw it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_ar: Option<String>,
    /// Catalog unit price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProductSnapshot {
    pub fn new(id: impl Into<RecordId>, name: impl Into<String>, price: Option<f64>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            name_ar: None,
            price,
            sku: None,
            image_url: None,
            stock_quantity: None,
            extra: Map::new(),
        }
    }

    /// Snapshot carrying only an id, for products not present in the cache.
    pub fn bare(id: impl Into<RecordId>) -> Self {
        Self::new(id, String::new(), None)
    }

    /// Typed view over a cached product record.
    pub fn from_record(record: &Record) -> Option<Self> {
        match serde_json::from_value(record.to_value()) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                tracing::warn!(product_id = %record.id(), error = %err, "product record has unexpected shape");
                None
            }
        }
    }
}
