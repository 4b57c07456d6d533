//! Core types for Ticket Ledger.
//!
//! This module provides type-safe wrappers and plain records for the order
//! sync pipeline.

pub mod id;
pub mod order;
pub mod product;
pub mod row;
pub mod show_date;

pub use id::*;
pub use order::{EnrichmentRecord, Order, OrderStatus, PurchasedItem, RecordKey};
pub use product::{EnrichedProduct, Enrichment, ProductDetails};
pub use row::{COLUMN_COUNT, SpreadsheetRow, parse_ticket_count};
pub use show_date::{ShowDateError, ShowDateZone, format_show_date};
