//! Resource types mirrored by the entity cache.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use storefront_core::StoreError;

/// One server collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Products,
    Categories,
    CarBrands,
    CarModels,
    ProductBrands,
    Orders,
    BundleOffers,
    Promotions,
    Suppliers,
    Distributors,
    Partners,
    Admins,
    Subscribers,
    Customers,
}

impl ResourceType {
    pub const ALL: [ResourceType; 14] = [
        ResourceType::Products,
        ResourceType::Categories,
        ResourceType::CarBrands,
        ResourceType::CarModels,
        ResourceType::ProductBrands,
        ResourceType::Orders,
        ResourceType::BundleOffers,
        ResourceType::Promotions,
        ResourceType::Suppliers,
        ResourceType::Distributors,
        ResourceType::Partners,
        ResourceType::Admins,
        ResourceType::Subscribers,
        ResourceType::Customers,
    ];

    /// Collections captured by data snapshots.
    pub const SNAPSHOT_TRACKED: [ResourceType; 5] = [
        ResourceType::Products,
        ResourceType::Categories,
        ResourceType::Orders,
        ResourceType::CarBrands,
        ResourceType::CarModels,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Products => "products",
            ResourceType::Categories => "categories",
            ResourceType::CarBrands => "car_brands",
            ResourceType::CarModels => "car_models",
            ResourceType::ProductBrands => "product_brands",
            ResourceType::Orders => "orders",
            ResourceType::BundleOffers => "bundle_offers",
            ResourceType::Promotions => "promotions",
            ResourceType::Suppliers => "suppliers",
            ResourceType::Distributors => "distributors",
            ResourceType::Partners => "partners",
            ResourceType::Admins => "admins",
            ResourceType::Subscribers => "subscribers",
            ResourceType::Customers => "customers",
        }
    }

    /// Operational collections are large, user-scoped and always refetched on
    /// startup; they never reach disk.
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            ResourceType::Suppliers
                | ResourceType::Distributors
                | ResourceType::Partners
                | ResourceType::Admins
                | ResourceType::Subscribers
                | ResourceType::Customers
                | ResourceType::Orders
        )
    }

    pub fn is_snapshot_tracked(&self) -> bool {
        Self::SNAPSHOT_TRACKED.contains(self)
    }

    /// REST collection path on the remote service.
    pub fn endpoint(&self) -> String {
        format!("/{}", self.as_str().replace('_', "-"))
    }
}

impl core::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_");
        ResourceType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| StoreError::validation(format!("unknown resource type: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_snake_and_kebab_names() {
        assert_eq!("car_models".parse::<ResourceType>().unwrap(), ResourceType::CarModels);
        assert_eq!("product-brands".parse::<ResourceType>().unwrap(), ResourceType::ProductBrands);
        assert!("widgets".parse::<ResourceType>().is_err());
    }

    #[test]
    fn operational_collections_are_never_snapshot_tracked_except_orders() {
        for t in ResourceType::ALL {
            if t.is_operational() && t != ResourceType::Orders {
                assert!(!t.is_snapshot_tracked(), "{t} should not be tracked");
            }
        }
        assert!(ResourceType::Orders.is_snapshot_tracked());
    }

    #[test]
    fn endpoint_uses_kebab_case() {
        assert_eq!(ResourceType::CarBrands.endpoint(), "/car-brands");
    }

    #[test]
    fn serializes_as_snake_case_key() {
        let json = serde_json::to_string(&ResourceType::BundleOffers).unwrap();
        assert_eq!(json, "\"bundle_offers\"");
    }
}
