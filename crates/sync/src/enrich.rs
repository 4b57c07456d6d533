//! Product enrichment.
//!
//! Each purchased item is joined with its product's CMS data: venue and
//! location names, the show date and current inventory. Items are handled
//! one at a time and a failing item never stops the batch.

use ticket_ledger_core::{
    EnrichedProduct, EnrichmentRecord, ProductDetails, ShowDateError, ShowDateZone,
    format_show_date,
};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::CmsCollections;
use crate::throttle::{self, RetryPolicy};
use crate::webflow::{CommerceApi, WebflowError};

/// Errors enriching a single item.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error(transparent)]
    Webflow(#[from] WebflowError),

    #[error("product {product_id} has no {field}")]
    MissingField {
        product_id: String,
        field: &'static str,
    },

    #[error(transparent)]
    ShowDate(#[from] ShowDateError),
}

/// What enrichment needs to know besides the records.
#[derive(Debug, Clone, Default)]
pub struct EnrichSettings {
    pub collections: CmsCollections,
    pub show_date_zone: ShowDateZone,
}

/// Enrich every record, in order.
///
/// The result has one entry per input record. Failed lookups produce an
/// entry with the error message instead of product details.
#[instrument(skip_all, fields(records = records.len()))]
pub async fn enrich_records(
    api: &dyn CommerceApi,
    policy: &RetryPolicy,
    settings: &EnrichSettings,
    records: &[EnrichmentRecord],
) -> Vec<EnrichedProduct> {
    let mut enriched = Vec::with_capacity(records.len());

    for record in records {
        match enrich_one(api, policy, settings, record).await {
            Ok(details) => {
                info!(
                    variant_id = %record.variant_id,
                    product_id = %record.product_id,
                    "Enriched product"
                );
                enriched.push(EnrichedProduct::fetched(record, details));
            }
            Err(e) => {
                warn!(
                    variant_id = %record.variant_id,
                    product_id = %record.product_id,
                    error = %e,
                    "Failed to enrich product"
                );
                enriched.push(EnrichedProduct::failed(record, e.to_string()));
            }
        }
    }

    enriched
}

async fn enrich_one(
    api: &dyn CommerceApi,
    policy: &RetryPolicy,
    settings: &EnrichSettings,
    record: &EnrichmentRecord,
) -> Result<ProductDetails, EnrichError> {
    let missing = |field| EnrichError::MissingField {
        product_id: record.product_id.to_string(),
        field,
    };

    let product = throttle::call(policy, "get_product", || {
        api.get_product(&record.product_id)
    })
    .await?
    .product;
    let fields = product.field_data;

    let venue_id = fields.venue.ok_or_else(|| missing("venue"))?;
    let venue = throttle::call(policy, "get_venue", || {
        api.get_collection_item(&settings.collections.venue, &venue_id)
    })
    .await?;

    let location_id = fields.location.ok_or_else(|| missing("location"))?;
    let location = throttle::call(policy, "get_location", || {
        api.get_collection_item(&settings.collections.location, &location_id)
    })
    .await?;

    let inventory = throttle::call(policy, "get_inventory", || {
        api.get_inventory(&settings.collections.inventory, &record.variant_id)
    })
    .await?;

    let doors_open = fields.doors_open.ok_or_else(|| missing("doors-open date"))?;
    let show_date = format_show_date(&doors_open, settings.show_date_zone)?;

    Ok(ProductDetails {
        product_slug: fields.slug.unwrap_or_default(),
        venue: venue.field_data.name.unwrap_or_default(),
        location: location.field_data.name.unwrap_or_default(),
        show_date,
        product_inventory: inventory.quantity,
    })
}
