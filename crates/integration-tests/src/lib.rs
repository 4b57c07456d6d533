//! Integration tests for Ticket Ledger.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p ticket-ledger-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `resume_sync` - Full runs of the sync orchestrator
//! - `http_routes` - Entry points driven through the axum router
//!
//! The upstream APIs are replaced by the in-memory fakes below, so no network
//! access or credentials are needed.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ticket_ledger_core::{
    CollectionId, ItemId, Order, OrderId, OrderStatus, ProductId, PurchasedItem, ShowDateZone,
    SpreadsheetRow, VariantId,
};
use ticket_ledger_sync::checkpoint::CheckpointStore;
use ticket_ledger_sync::config::{CmsCollections, SyncSettings};
use ticket_ledger_sync::enrich::EnrichSettings;
use ticket_ledger_sync::service::SyncService;
use ticket_ledger_sync::sheets::{ColumnValues, SheetStore, SheetsError};
use ticket_ledger_sync::throttle::RetryPolicy;
use ticket_ledger_sync::webflow::{
    CollectionItem, CollectionItemFieldData, CommerceApi, Inventory, OrdersPage, OrdersQuery,
    Pagination, Product, ProductFieldData, ProductResponse, WebflowError,
};
use tokio::sync::Notify;

pub const VENUES: &str = "venues";
pub const LOCATIONS: &str = "locations";
pub const SKUS: &str = "skus";

/// Page delay used by test runs.
pub const PAGE_DELAY: Duration = Duration::from_secs(60);

/// Header row of the tracking sheet.
pub const HEADER: [&str; 8] = [
    "Product ID",
    "Variant ID",
    "Product Name",
    "Location",
    "Venue",
    "Show Date",
    "Tickets Bought",
    "Inventory",
];

// =============================================================================
// Builders
// =============================================================================

/// An order whose items are `(variant, product, count)`.
#[must_use]
pub fn order(id: &str, status: OrderStatus, items: &[(&str, &str, u32)]) -> Order {
    Order {
        order_id: OrderId::new(id),
        status,
        purchased_items: items
            .iter()
            .map(|(variant, product, count)| PurchasedItem {
                variant_id: VariantId::new(*variant),
                product_id: ProductId::new(*product),
                variant_name: format!("{product} / {variant}"),
                count: *count,
            })
            .collect(),
    }
}

// =============================================================================
// Commerce API fake
// =============================================================================

/// In-memory Webflow site.
///
/// Orders are served in the order they were added, without server-side
/// status filtering. Unknown products and CMS items answer 404.
#[derive(Default)]
pub struct FakeCommerce {
    orders: Vec<Order>,
    products: HashMap<String, ProductFieldData>,
    items: HashMap<(String, String), String>,
    inventory: HashMap<String, i64>,
    /// Remaining 429 answers for order listing.
    order_rate_limits: AtomicU32,
    /// Held by the first order listing until notified.
    gate: Mutex<Option<Arc<Notify>>>,
    queries: Mutex<Vec<OrdersQuery>>,
}

impl FakeCommerce {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_order(mut self, order: Order) -> Self {
        self.orders.push(order);
        self
    }

    /// Register a show product with its venue, location and doors-open time.
    #[must_use]
    pub fn with_show(mut self, product: &str, venue: &str, location: &str, doors_open: &str) -> Self {
        let venue_id = format!("{product}-venue");
        let location_id = format!("{product}-location");

        self.products.insert(
            product.to_string(),
            ProductFieldData {
                name: Some(product.to_string()),
                slug: Some(format!("{product}-slug")),
                venue: Some(ItemId::new(venue_id.clone())),
                location: Some(ItemId::new(location_id.clone())),
                doors_open: Some(doors_open.to_string()),
            },
        );
        self.items
            .insert((VENUES.to_string(), venue_id), venue.to_string());
        self.items
            .insert((LOCATIONS.to_string(), location_id), location.to_string());
        self
    }

    #[must_use]
    pub fn with_inventory(mut self, variant: &str, quantity: i64) -> Self {
        self.inventory.insert(variant.to_string(), quantity);
        self
    }

    /// Answer the next `count` order listings with HTTP 429.
    #[must_use]
    pub fn rate_limit_orders(self, count: u32) -> Self {
        self.order_rate_limits.store(count, Ordering::SeqCst);
        self
    }

    /// Hold the first order listing until `gate` is notified.
    #[must_use]
    pub fn gated(self, gate: Arc<Notify>) -> Self {
        *self.gate.lock().unwrap() = Some(gate);
        self
    }

    /// Order queries received so far.
    pub fn queries(&self) -> Vec<OrdersQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommerceApi for FakeCommerce {
    async fn list_orders(&self, query: &OrdersQuery) -> Result<OrdersPage, WebflowError> {
        self.queries.lock().unwrap().push(*query);

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let limited = self
            .order_rate_limits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if limited {
            return Err(WebflowError::RateLimited {
                retry_after: Some(5),
            });
        }

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

    async fn get_product(&self, product_id: &ProductId) -> Result<ProductResponse, WebflowError> {
        self.products
            .get(product_id.as_str())
            .map(|fields| ProductResponse {
                product: Product {
                    id: product_id.clone(),
                    field_data: fields.clone(),
                },
            })
            .ok_or_else(|| WebflowError::NotFound(format!("product {product_id}")))
    }

    async fn get_collection_item(
        &self,
        collection_id: &CollectionId,
        item_id: &ItemId,
    ) -> Result<CollectionItem, WebflowError> {
        self.items
            .get(&(collection_id.to_string(), item_id.to_string()))
            .map(|name| CollectionItem {
                id: item_id.clone(),
                field_data: CollectionItemFieldData {
                    name: Some(name.clone()),
                    slug: None,
                },
            })
            .ok_or_else(|| WebflowError::NotFound(format!("item {item_id}")))
    }

    async fn get_inventory(
        &self,
        _collection_id: &CollectionId,
        variant_id: &VariantId,
    ) -> Result<Inventory, WebflowError> {
        Ok(Inventory {
            quantity: self.inventory.get(variant_id.as_str()).copied(),
            inventory_type: None,
        })
    }
}

// =============================================================================
// Sheet fake
// =============================================================================

/// In-memory tracking sheet; row 1 is the header.
pub struct MemorySheet {
    rows: Mutex<Vec<Vec<String>>>,
    /// Successful row writes left before writes start failing.
    writes_left: AtomicUsize,
}

impl Default for MemorySheet {
    fn default() -> Self {
        Self {
            rows: Mutex::new(vec![HEADER.iter().map(ToString::to_string).collect()]),
            writes_left: AtomicUsize::new(usize::MAX),
        }
    }
}

impl MemorySheet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an existing data row.
    #[must_use]
    pub fn with_row(self, cells: &[&str]) -> Self {
        self.rows
            .lock()
            .unwrap()
            .push(cells.iter().map(ToString::to_string).collect());
        self
    }

    /// Let `count` more writes succeed, then fail every write.
    pub fn fail_after_writes(&self, count: usize) {
        self.writes_left.store(count, Ordering::SeqCst);
    }

    /// Stop failing writes.
    pub fn heal(&self) {
        self.writes_left.store(usize::MAX, Ordering::SeqCst);
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        self.rows.lock().unwrap().clone()
    }

    /// Data rows whose variant column equals `variant`.
    pub fn rows_for(&self, variant: &str) -> Vec<Vec<String>> {
        self.rows()
            .into_iter()
            .skip(1)
            .filter(|row| row.get(1).map(String::as_str) == Some(variant))
            .collect()
    }

    /// Cumulative tickets on the first row of `variant`.
    pub fn tickets_for(&self, variant: &str) -> Option<String> {
        self.rows_for(variant)
            .first()
            .and_then(|row| row.get(6).cloned())
    }

    fn take_write(&self) -> Result<(), SheetsError> {
        self.writes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map(|_| ())
            .map_err(|_| SheetsError::Api {
                status: 503,
                message: "backend unavailable".to_string(),
            })
    }
}

fn cells(row: &SpreadsheetRow) -> Vec<String> {
    row.to_cells()
        .iter()
        .map(|v| v.as_str().map_or_else(|| v.to_string(), ToString::to_string))
        .collect()
}

#[async_trait]
impl SheetStore for MemorySheet {
    async fn variant_column(&self) -> Result<ColumnValues, SheetsError> {
        let values = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .map(|row| row.get(1).cloned().unwrap_or_default())
            .collect();
        Ok(ColumnValues::new(1, values))
    }

    async fn read_row(&self, row: u32) -> Result<Vec<String>, SheetsError> {
        let index = usize::try_from(row).unwrap() - 1;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(index)
            .cloned()
            .unwrap_or_default())
    }

    async fn write_row(&self, row: u32, values: &SpreadsheetRow) -> Result<(), SheetsError> {
        self.take_write()?;
        let index = usize::try_from(row).unwrap() - 1;
        if let Some(slot) = self.rows.lock().unwrap().get_mut(index) {
            *slot = cells(values);
        }
        Ok(())
    }

    async fn append_row(&self, values: &SpreadsheetRow) -> Result<(), SheetsError> {
        self.take_write()?;
        self.rows.lock().unwrap().push(cells(values));
        Ok(())
    }
}

// =============================================================================
// Test context
// =============================================================================

/// A sync service wired to fakes, with its files in a fresh temp directory.
pub struct TestContext {
    pub service: SyncService,
    pub commerce: Arc<FakeCommerce>,
    pub sheet: Arc<MemorySheet>,
    pub dir: PathBuf,
}

impl TestContext {
    /// Context fetching one order per page.
    #[must_use]
    pub fn new(commerce: FakeCommerce, sheet: MemorySheet) -> Self {
        Self::with_page_size(commerce, sheet, 1)
    }

    #[must_use]
    pub fn with_page_size(commerce: FakeCommerce, sheet: MemorySheet, page_size: u32) -> Self {
        let dir = std::env::temp_dir().join(format!("ticket-ledger-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();

        let commerce = Arc::new(commerce);
        let sheet = Arc::new(sheet);

        let settings = SyncSettings {
            page_size,
            page_delay: PAGE_DELAY,
            retry: RetryPolicy::default(),
            checkpoint_path: dir.join("progress.json"),
            export_path: dir.join("orders.json"),
            show_date_zone: ShowDateZone::Utc,
        };
        let enrich = EnrichSettings {
            collections: CmsCollections {
                venue: CollectionId::new(VENUES),
                location: CollectionId::new(LOCATIONS),
                inventory: CollectionId::new(SKUS),
            },
            show_date_zone: ShowDateZone::Utc,
        };

        let service = SyncService::new(commerce.clone(), sheet.clone(), settings, enrich);

        Self {
            service,
            commerce,
            sheet,
            dir,
        }
    }

    /// Store for the service's checkpoint file.
    #[must_use]
    pub fn checkpoint(&self) -> CheckpointStore {
        self.service.checkpoint_store().clone()
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}
