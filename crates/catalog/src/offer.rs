//! Bundle offers: several products sold together at a percentage discount.

use serde::{Deserialize, Serialize};
use storefront_core::{RecordId, StoreError, StoreResult};

use crate::record::Record;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleOffer {
    pub id: RecordId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_ar: Option<String>,
    /// Percentage off each product's original price (0..=100).
    pub discount_percentage: f64,
    #[serde(default)]
    pub product_ids: Vec<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_car_model_id: Option<RecordId>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl BundleOffer {
    pub fn new(id: impl Into<RecordId>, name: impl Into<String>, discount_percentage: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            name_ar: None,
            discount_percentage,
            product_ids: Vec::new(),
            target_car_model_id: None,
            is_active: true,
        }
    }

    pub fn from_record(record: &Record) -> Option<Self> {
        serde_json::from_value(record.to_value()).ok()
    }

    pub fn validate(&self) -> StoreResult<()> {
        if !self.discount_percentage.is_finite()
            || !(0.0..=100.0).contains(&self.discount_percentage)
        {
            return Err(StoreError::validation(format!(
                "bundle discount must be within 0..=100, got {}",
                self.discount_percentage
            )));
        }
        Ok(())
    }
}
