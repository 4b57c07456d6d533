//! Order fetching.

use ticket_ledger_core::{EnrichmentRecord, Order};
use tracing::{debug, instrument};

use crate::throttle::{self, RetryPolicy};
use crate::webflow::{CommerceApi, OrdersQuery, WebflowError};

/// Fetch one page of fulfilled orders starting at `offset`.
///
/// The server-side status filter is applied again locally; an empty result
/// means there is nothing left to sync.
///
/// # Errors
///
/// Returns the `WebflowError` of the request once rate-limit retries are
/// exhausted or on any other upstream failure.
#[instrument(skip(api, policy))]
pub async fn fetch_orders_page(
    api: &dyn CommerceApi,
    policy: &RetryPolicy,
    offset: u32,
    limit: u32,
) -> Result<Vec<Order>, WebflowError> {
    let query = OrdersQuery::fulfilled(offset, limit);
    let page = throttle::call(policy, "list_orders", || api.list_orders(&query)).await?;

    let received = page.orders.len();
    let orders: Vec<Order> = page.orders.into_iter().filter(Order::is_fulfilled).collect();

    debug!(received, fulfilled = orders.len(), "Fetched order page");
    Ok(orders)
}

/// One enrichment record per purchased item, in order and item order.
#[must_use]
pub fn flatten_orders(orders: &[Order]) -> Vec<EnrichmentRecord> {
    orders
        .iter()
        .flat_map(|order| {
            order
                .purchased_items
                .iter()
                .enumerate()
                .map(move |(index, item)| EnrichmentRecord::from_item(order, index, item))
        })
        .collect()
}
