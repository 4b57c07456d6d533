//! Webflow Data API v2 client.
//!
//! Read-only access to the pieces of Webflow the sync needs:
//! e-commerce orders, product details, CMS items (venues and locations) and
//! inventory.
//!
//! # API Reference
//!
//! - Base URL: `https://api.webflow.com/v2`
//! - Authentication: site API token via `Authorization: Bearer <token>`
//! - API Version: `2.0.0` (specified via `accept-version` header)
//!
//! The [`CommerceApi`] trait is the seam the sync pipeline is written
//! against; [`WebflowClient`] is the HTTP implementation.

mod client;
pub mod types;

pub use client::WebflowClient;
pub use types::*;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use ticket_ledger_core::{CollectionId, ItemId, ProductId, VariantId};

use crate::throttle::RateLimitAware;

/// Errors that can occur when interacting with the Webflow API.
#[derive(Debug, Error)]
pub enum WebflowError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited by Webflow.
    #[error("Rate limited, retry after {}", describe_retry_after(*.retry_after))]
    RateLimited { retry_after: Option<u64> },

    /// Still rate limited after every allowed retry.
    #[error("Rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unauthorized (invalid or revoked token).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

fn describe_retry_after(retry_after: Option<u64>) -> String {
    retry_after.map_or_else(|| "an unspecified delay".to_string(), |s| format!("{s} seconds"))
}

impl RateLimitAware for WebflowError {
    fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => retry_after.map(Duration::from_secs),
            _ => None,
        }
    }

    fn rate_limit_exceeded(attempts: u32) -> Self {
        Self::RateLimitExceeded { attempts }
    }
}

/// Read access to the commerce platform.
#[async_trait]
pub trait CommerceApi: Send + Sync {
    /// One page of site orders.
    async fn list_orders(&self, query: &OrdersQuery) -> Result<OrdersPage, WebflowError>;

    /// Product detail, including its CMS field data.
    async fn get_product(&self, product_id: &ProductId) -> Result<ProductResponse, WebflowError>;

    /// A single CMS collection item.
    async fn get_collection_item(
        &self,
        collection_id: &CollectionId,
        item_id: &ItemId,
    ) -> Result<CollectionItem, WebflowError>;

    /// Inventory for a SKU of the given collection.
    async fn get_inventory(
        &self,
        collection_id: &CollectionId,
        variant_id: &VariantId,
    ) -> Result<Inventory, WebflowError>;
}
