//! Cart wire types and the requests built from them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use storefront_core::{BundleGroupId, RecordId};

use crate::request::{HttpMethod, RemoteRequest};

pub const CART_PATH: &str = "/cart";
pub const CART_ADD_PATH: &str = "/cart/add";
pub const CART_UPDATE_PATH: &str = "/cart/update";
pub const CART_CLEAR_PATH: &str = "/cart/clear";
pub const CART_VOID_BUNDLE_PATH: &str = "/cart/void-bundle";

/// Body of `POST /cart/add`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartAddBody {
    pub product_id: RecordId,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_group_id: Option<BundleGroupId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_offer_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_discount_percentage: Option<f64>,
}

impl CartAddBody {
    pub fn plain(product_id: RecordId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
            bundle_group_id: None,
            bundle_offer_id: None,
            bundle_discount_percentage: None,
        }
    }

    pub fn to_request(&self) -> RemoteRequest {
        RemoteRequest::new(HttpMethod::Post, CART_ADD_PATH, serde_json::to_value(self).ok())
    }
}

/// Body of `PUT /cart/update`; a quantity of zero removes the line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartUpdateBody {
    pub product_id: RecordId,
    pub quantity: u32,
}

impl CartUpdateBody {
    pub fn to_request(&self) -> RemoteRequest {
        RemoteRequest::new(HttpMethod::Put, CART_UPDATE_PATH, serde_json::to_value(self).ok())
    }
}

pub fn void_bundle_request(bundle_group_id: &BundleGroupId) -> RemoteRequest {
    RemoteRequest::new(
        HttpMethod::Delete,
        format!("{CART_VOID_BUNDLE_PATH}/{bundle_group_id}"),
        None,
    )
}

pub fn clear_cart_request() -> RemoteRequest {
    RemoteRequest::new(HttpMethod::Delete, CART_CLEAR_PATH, None)
}

pub fn fetch_cart_request() -> RemoteRequest {
    RemoteRequest::get(CART_PATH)
}

/// How the server priced a cart line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountDetails {
    #[serde(default = "no_discount")]
    pub discount_type: String,
    #[serde(default)]
    pub discount_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_source_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_source_name: Option<String>,
}

fn no_discount() -> String {
    "none".to_string()
}

impl Default for DiscountDetails {
    fn default() -> Self {
        Self {
            discount_type: no_discount(),
            discount_value: 0.0,
            discount_source_id: None,
            discount_source_name: None,
        }
    }
}

impl DiscountDetails {
    pub fn is_bundle(&self) -> bool {
        self.discount_type == "bundle"
    }
}

/// One line of the authoritative server cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerCartItem {
    pub product_id: RecordId,
    pub quantity: i64,
    #[serde(default)]
    pub original_unit_price: Option<f64>,
    #[serde(default)]
    pub final_unit_price: Option<f64>,
    #[serde(default)]
    pub discount_details: DiscountDetails,
    #[serde(default)]
    pub bundle_group_id: Option<BundleGroupId>,
    #[serde(default)]
    pub product: Option<Value>,
}

/// Response of `GET /cart`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerCart {
    #[serde(default)]
    pub items: Vec<ServerCartItem>,
    #[serde(default)]
    pub subtotal: f64,
    #[serde(default)]
    pub total_discount: f64,
    #[serde(default)]
    pub total: f64,
}
