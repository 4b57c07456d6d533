//! Sync and export routes.

use axum::{
    Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;
use tracing::instrument;

use crate::error::AppError;
use crate::export::DEFAULT_EXPORT_LIMIT;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/resume", get(resume))
        .route("/sync", get(export))
}

// =============================================================================
// Query Parameters
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    pub limit: Option<usize>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Run the paginated sync from the saved checkpoint.
///
/// Holds the request open until the run finishes.
#[instrument(skip(state))]
async fn resume(State(state): State<AppState>) -> Result<String, AppError> {
    let report = state.sync().run().await?;
    Ok(format!(
        "Sync complete. Total items processed: {}",
        report.items_processed
    ))
}

/// Save up to `limit` fulfilled orders to the export file.
#[instrument(skip(state))]
async fn export(
    State(state): State<AppState>,
    Query(params): Query<ExportParams>,
) -> Result<String, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_EXPORT_LIMIT);
    if limit == 0 {
        return Err(AppError::BadRequest("limit must be at least 1".to_string()));
    }

    let count = state.sync().export(limit).await.map_err(AppError::Export)?;
    Ok(format!(
        "Synced {count} fulfilled orders and saved to {}",
        state.sync().settings().export_path.display()
    ))
}
