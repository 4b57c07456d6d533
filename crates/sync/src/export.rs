//! Fulfilled order export.
//!
//! Pages through fulfilled orders and saves them as pretty-printed JSON.
//! Nothing is written to the spreadsheet and the checkpoint is untouched.

use std::path::{Path, PathBuf};

use thiserror::Error;
use ticket_ledger_core::Order;
use tracing::{info, instrument};

use crate::throttle::{self, RetryPolicy};
use crate::webflow::{CommerceApi, OrdersQuery, WebflowError};

/// Orders requested per page while exporting.
pub const EXPORT_PAGE_SIZE: u32 = 10;

/// Orders exported when no limit is given.
pub const DEFAULT_EXPORT_LIMIT: usize = 99;

/// Errors exporting orders.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Webflow(#[from] WebflowError),

    #[error("failed to write export {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize orders: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Collect up to `limit` fulfilled orders, oldest page first.
///
/// Stops at `limit`, at the total the API reports, or at the first empty
/// page, whichever comes first.
///
/// # Errors
///
/// Returns `ExportError::Webflow` if a page cannot be fetched.
#[instrument(skip(api, policy))]
pub async fn collect_fulfilled_orders(
    api: &dyn CommerceApi,
    policy: &RetryPolicy,
    limit: usize,
) -> Result<Vec<Order>, ExportError> {
    let mut collected = Vec::new();
    let mut offset: u32 = 0;

    while collected.len() < limit {
        let query = OrdersQuery::fulfilled(offset, EXPORT_PAGE_SIZE);
        let page = throttle::call(policy, "list_orders", || api.list_orders(&query)).await?;

        if page.orders.is_empty() {
            break;
        }

        let total = page.pagination.map(|p| p.total);
        info!(offset, fetched = page.orders.len(), total, "Fetched export page");

        let remaining = limit - collected.len();
        collected.extend(
            page.orders
                .into_iter()
                .filter(Order::is_fulfilled)
                .take(remaining),
        );

        offset = offset.saturating_add(EXPORT_PAGE_SIZE);
        if total.is_some_and(|total| offset >= total) {
            break;
        }
    }

    Ok(collected)
}

/// Export up to `limit` fulfilled orders to `path`.
///
/// Returns the number of orders written.
///
/// # Errors
///
/// Returns `ExportError` if fetching or writing fails.
pub async fn export_fulfilled_orders(
    api: &dyn CommerceApi,
    policy: &RetryPolicy,
    limit: usize,
    path: &Path,
) -> Result<usize, ExportError> {
    let orders = collect_fulfilled_orders(api, policy, limit).await?;
    let json = serde_json::to_vec_pretty(&orders)?;

    tokio::fs::write(path, json)
        .await
        .map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    info!(count = orders.len(), path = %path.display(), "Exported fulfilled orders");
    Ok(orders.len())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use ticket_ledger_core::{CollectionId, ItemId, OrderId, OrderStatus, ProductId, VariantId};

    use super::*;
    use crate::webflow::{CollectionItem, Inventory, OrdersPage, Pagination, ProductResponse};

    /// Serves `orders` in pages, like the orders endpoint.
    struct Shop {
        orders: Vec<Order>,
        requests: Mutex<u32>,
    }

    impl Shop {
        fn with(count: usize, status_for: impl Fn(usize) -> OrderStatus) -> Self {
            Self {
                orders: (0..count)
                    .map(|i| Order {
                        order_id: OrderId::new(format!("o{i}")),
                        status: status_for(i),
                        purchased_items: Vec::new(),
                    })
                    .collect(),
                requests: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl CommerceApi for Shop {
        async fn list_orders(&self, query: &OrdersQuery) -> Result<OrdersPage, WebflowError> {
            *self.requests.lock().unwrap() += 1;
            let start = usize::try_from(query.offset).unwrap();
            let size = usize::try_from(query.limit).unwrap();
            Ok(OrdersPage {
                orders: self.orders.iter().skip(start).take(size).cloned().collect(),
                pagination: Some(Pagination {
                    limit: query.limit,
                    offset: query.offset,
                    total: u32::try_from(self.orders.len()).unwrap(),
                }),
            })
        }

        async fn get_product(&self, _: &ProductId) -> Result<ProductResponse, WebflowError> {
            unreachable!()
        }

        async fn get_collection_item(
            &self,
            _: &CollectionId,
            _: &ItemId,
        ) -> Result<CollectionItem, WebflowError> {
            unreachable!()
        }

        async fn get_inventory(
            &self,
            _: &CollectionId,
            _: &VariantId,
        ) -> Result<Inventory, WebflowError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn test_stops_at_limit() {
        let shop = Shop::with(35, |_| OrderStatus::Fulfilled);

        let orders = collect_fulfilled_orders(&shop, &RetryPolicy::default(), 12)
            .await
            .unwrap();

        assert_eq!(orders.len(), 12);
        assert_eq!(*shop.requests.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_stops_at_reported_total() {
        let shop = Shop::with(15, |_| OrderStatus::Fulfilled);

        let orders = collect_fulfilled_orders(&shop, &RetryPolicy::default(), 99)
            .await
            .unwrap();

        assert_eq!(orders.len(), 15);
        assert_eq!(*shop.requests.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_skips_unfulfilled() {
        let shop = Shop::with(10, |i| {
            if i % 2 == 0 {
                OrderStatus::Fulfilled
            } else {
                OrderStatus::Refunded
            }
        });

        let orders = collect_fulfilled_orders(&shop, &RetryPolicy::default(), 99)
            .await
            .unwrap();

        assert_eq!(orders.len(), 5);
        assert!(orders.iter().all(Order::is_fulfilled));
    }

    #[tokio::test]
    async fn test_export_writes_pretty_json() {
        let shop = Shop::with(3, |_| OrderStatus::Fulfilled);
        let path = std::env::temp_dir().join(format!("orders-{}.json", uuid::Uuid::new_v4()));

        let count = export_fulfilled_orders(&shop, &RetryPolicy::default(), 99, &path)
            .await
            .unwrap();

        assert_eq!(count, 3);
        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(raw.contains("\n  {"));
        let saved: Vec<Order> = serde_json::from_str(&raw).unwrap();
        assert_eq!(saved.first().map(|o| o.order_id.as_str()), Some("o0"));
        let _ = tokio::fs::remove_file(&path).await;
    }
}
