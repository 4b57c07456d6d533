//! Spreadsheet reconciliation.
//!
//! The tracking sheet holds one row per variant. For every enriched item the
//! variant column is scanned: a hit adds the item's tickets to the row's
//! running total, a miss appends a fresh row.

use thiserror::Error;
use ticket_ledger_core::{EnrichedProduct, SpreadsheetRow, parse_ticket_count};
use tracing::{info, instrument, warn};

use crate::checkpoint::{Checkpoint, CheckpointError, CheckpointStore};
use crate::sheets::{SheetStore, SheetsError};
use crate::throttle::{self, RetryPolicy};

/// Errors that abort reconciliation.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Sheets(#[from] SheetsError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

/// What a reconciliation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ReconcileSummary {
    /// New rows appended.
    pub appended: usize,
    /// Existing rows whose total was increased.
    pub updated: usize,
    /// Items skipped because enrichment failed.
    pub skipped: usize,
    /// Items already written by an earlier, interrupted run.
    pub already_applied: usize,
    /// Items whose variant appeared on more than one row.
    pub duplicates: usize,
}

impl std::ops::AddAssign for ReconcileSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.appended += rhs.appended;
        self.updated += rhs.updated;
        self.skipped += rhs.skipped;
        self.already_applied += rhs.already_applied;
        self.duplicates += rhs.duplicates;
    }
}

/// Write `products` into the sheet, one row operation at a time.
///
/// Each written item is recorded in `progress` (and persisted through
/// `store`) so a resumed run skips it.
///
/// # Errors
///
/// Returns `ReconcileError` on the first Sheets or checkpoint failure; rows
/// written before the failure stay written and recorded.
#[instrument(skip_all, fields(products = products.len(), offset = progress.last_processed))]
pub async fn reconcile(
    sheet: &dyn SheetStore,
    policy: &RetryPolicy,
    store: &CheckpointStore,
    progress: &mut Checkpoint,
    products: &[EnrichedProduct],
) -> Result<ReconcileSummary, ReconcileError> {
    let mut summary = ReconcileSummary::default();

    for product in products {
        let Some(details) = product.details() else {
            warn!(
                variant_id = %product.variant_id,
                error = product.error().unwrap_or_default(),
                "Skipping product that failed enrichment"
            );
            summary.skipped += 1;
            continue;
        };

        if progress.is_applied(&product.key) {
            info!(key = %product.key, "Item already applied, skipping");
            summary.already_applied += 1;
            continue;
        }

        let variant_id = product.variant_id.as_str();
        let column = throttle::call(policy, "read_variant_column", || sheet.variant_column()).await?;
        let rows = column.matching_rows(variant_id);

        if rows.len() > 1 {
            warn!(variant_id, rows = ?rows, "Variant appears on several rows, updating the first");
            summary.duplicates += 1;
        }

        let tickets = u64::from(product.tickets_bought);

        if let Some(&row) = rows.first() {
            let cells = throttle::call(policy, "read_row", || sheet.read_row(row)).await?;
            let previous = parse_ticket_count(&cells);
            let total = previous.saturating_add(tickets);

            let values = SpreadsheetRow::new(product, details, total);
            throttle::call(policy, "write_row", || sheet.write_row(row, &values)).await?;

            info!(variant_id, row, previous, total, "Updated sheet row");
            summary.updated += 1;
        } else {
            let values = SpreadsheetRow::new(product, details, tickets);
            throttle::call(policy, "append_row", || sheet.append_row(&values)).await?;

            info!(variant_id, total = tickets, "Appended sheet row");
            summary.appended += 1;
        }

        store.mark_applied(progress, &product.key).await?;
    }

    Ok(summary)
}
