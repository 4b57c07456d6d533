//! Order domain types as returned by the Webflow orders API.

use serde::{Deserialize, Serialize};

use super::id::{OrderId, ProductId, VariantId};

/// Webflow order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Unfulfilled,
    Fulfilled,
    Disputed,
    DisputeLost,
    Refunded,
    /// Any status this crate does not know about.
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Unfulfilled => write!(f, "unfulfilled"),
            Self::Fulfilled => write!(f, "fulfilled"),
            Self::Disputed => write!(f, "disputed"),
            Self::DisputeLost => write!(f, "dispute-lost"),
            Self::Refunded => write!(f, "refunded"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A Webflow e-commerce order.
///
/// Only the fields the sync needs are modelled; everything else in the
/// payload is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: OrderId,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub purchased_items: Vec<PurchasedItem>,
}

impl Order {
    /// Whether the order has been fulfilled.
    #[must_use]
    pub fn is_fulfilled(&self) -> bool {
        self.status == OrderStatus::Fulfilled
    }
}

/// A line item inside an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchasedItem {
    pub variant_id: VariantId,
    pub product_id: ProductId,
    /// Display name of the purchased variant.
    #[serde(default)]
    pub variant_name: String,
    /// Quantity purchased.
    #[serde(default)]
    pub count: u32,
}

/// Identity of a single line item across runs: order id plus the item's
/// position inside the order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub order_id: OrderId,
    pub item_index: usize,
}

impl RecordKey {
    #[must_use]
    pub fn new(order_id: OrderId, item_index: usize) -> Self {
        Self {
            order_id,
            item_index,
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.order_id, self.item_index)
    }
}

/// Per-item working record handed to the enricher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentRecord {
    pub key: RecordKey,
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub product_name: String,
    pub tickets_bought: u32,
}

impl EnrichmentRecord {
    /// Build the record for the item at `item_index` inside `order`.
    #[must_use]
    pub fn from_item(order: &Order, item_index: usize, item: &PurchasedItem) -> Self {
        Self {
            key: RecordKey::new(order.order_id.clone(), item_index),
            variant_id: item.variant_id.clone(),
            product_id: item.product_id.clone(),
            product_name: item.variant_name.clone(),
            tickets_bought: item.count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_deserializes_from_webflow_payload() {
        let json = r#"{
            "orderId": "8f2-1a0",
            "status": "fulfilled",
            "customerInfo": {"fullName": "Jane"},
            "purchasedItems": [
                {"variantId": "v1", "productId": "p1", "variantName": "GA Ticket", "count": 2}
            ]
        }"#;

        let order: Order = serde_json::from_str(json).expect("valid order");
        assert!(order.is_fulfilled());
        assert_eq!(order.order_id.as_str(), "8f2-1a0");
        assert_eq!(order.purchased_items.len(), 1);
        assert_eq!(order.purchased_items.first().map(|i| i.count), Some(2));
    }

    #[test]
    fn test_unknown_status_does_not_fail() {
        let json = r#"{"orderId": "o1", "status": "something-new", "purchasedItems": []}"#;
        let order: Order = serde_json::from_str(json).expect("valid order");
        assert_eq!(order.status, OrderStatus::Unknown);
        assert!(!order.is_fulfilled());
    }

    #[test]
    fn test_record_key_display() {
        let key = RecordKey::new(OrderId::new("o-42"), 3);
        assert_eq!(key.to_string(), "o-42#3");
    }

    #[test]
    fn test_status_display_matches_wire_format() {
        assert_eq!(OrderStatus::DisputeLost.to_string(), "dispute-lost");
        let json = serde_json::to_string(&OrderStatus::DisputeLost).expect("serialize");
        assert_eq!(json, "\"dispute-lost\"");
    }
}
