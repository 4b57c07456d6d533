//! Enrichment results.

use serde::{Deserialize, Serialize};

use super::id::{ProductId, VariantId};
use super::order::{EnrichmentRecord, RecordKey};

/// Data pulled from the CMS for one purchased item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub product_slug: String,
    pub venue: String,
    pub location: String,
    /// Show date formatted `DD-MM-YYYY`.
    pub show_date: String,
    /// Remaining inventory; `None` for untracked (infinite) inventory.
    pub product_inventory: Option<i64>,
}

/// Outcome of enriching a single record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Enrichment {
    Fetched(ProductDetails),
    Failed { error: String },
}

/// An enrichment record after all CMS lookups have been attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedProduct {
    pub key: RecordKey,
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub product_name: String,
    pub tickets_bought: u32,
    pub enrichment: Enrichment,
}

impl EnrichedProduct {
    /// Successful enrichment of `record`.
    #[must_use]
    pub fn fetched(record: &EnrichmentRecord, details: ProductDetails) -> Self {
        Self::with_outcome(record, Enrichment::Fetched(details))
    }

    /// Failed enrichment of `record`, keeping the error message.
    #[must_use]
    pub fn failed(record: &EnrichmentRecord, error: impl Into<String>) -> Self {
        Self::with_outcome(
            record,
            Enrichment::Failed {
                error: error.into(),
            },
        )
    }

    fn with_outcome(record: &EnrichmentRecord, enrichment: Enrichment) -> Self {
        Self {
            key: record.key.clone(),
            product_id: record.product_id.clone(),
            variant_id: record.variant_id.clone(),
            product_name: record.product_name.clone(),
            tickets_bought: record.tickets_bought,
            enrichment,
        }
    }

    /// Whether every lookup succeeded.
    #[must_use]
    pub const fn is_fetched(&self) -> bool {
        matches!(self.enrichment, Enrichment::Fetched(_))
    }

    /// CMS details, if enrichment succeeded.
    #[must_use]
    pub const fn details(&self) -> Option<&ProductDetails> {
        match &self.enrichment {
            Enrichment::Fetched(details) => Some(details),
            Enrichment::Failed { .. } => None,
        }
    }

    /// Error message, if enrichment failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.enrichment {
            Enrichment::Fetched(_) => None,
            Enrichment::Failed { error } => Some(error),
        }
    }
}
