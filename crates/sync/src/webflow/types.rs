//! Webflow API payload types.

use serde::{Deserialize, Serialize};
use ticket_ledger_core::{ItemId, Order, OrderStatus, ProductId};

/// Query for one page of orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrdersQuery {
    pub offset: u32,
    pub limit: u32,
    /// Server-side status filter.
    pub status: Option<OrderStatus>,
}

impl OrdersQuery {
    /// Page of fulfilled orders.
    #[must_use]
    pub const fn fulfilled(offset: u32, limit: u32) -> Self {
        Self {
            offset,
            limit,
            status: Some(OrderStatus::Fulfilled),
        }
    }
}

/// `GET /sites/{site_id}/orders` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrdersPage {
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// Pagination metadata for list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub total: u32,
}

/// `GET /sites/{site_id}/products/{product_id}` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductResponse {
    pub product: Product,
}

/// A Webflow e-commerce product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    #[serde(default)]
    pub field_data: ProductFieldData,
}

/// Product CMS fields the sync reads.
///
/// The venue and location references point into separate CMS collections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductFieldData {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(rename = "venue-3", default)]
    pub venue: Option<ItemId>,
    #[serde(rename = "location-3", default)]
    pub location: Option<ItemId>,
    /// ISO 8601 timestamp at which doors open.
    #[serde(rename = "doors-open", default)]
    pub doors_open: Option<String>,
}

/// `GET /collections/{collection_id}/items/{item_id}` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionItem {
    pub id: ItemId,
    #[serde(default)]
    pub field_data: CollectionItemFieldData,
}

/// Generic CMS item fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionItemFieldData {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

/// `GET /collections/{collection_id}/items/{sku_id}/inventory` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    /// Units in stock; absent for infinite inventory.
    #[serde(default)]
    pub quantity: Option<i64>,
    /// `finite` or `infinite`.
    #[serde(default)]
    pub inventory_type: Option<String>,
}
