//! Unified error handling for the sync server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::service::SyncError;

/// Application-level error type for HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// A resume run failed.
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// The order export failed.
    #[error("Export error: {0}")]
    Export(SyncError),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    const fn is_conflict(&self) -> bool {
        matches!(self, Self::Sync(SyncError::AlreadyRunning))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_conflict() {
            tracing::warn!(error = %self, "Rejected request while a sync is running");
            return (
                StatusCode::CONFLICT,
                "A sync is already in progress.".to_string(),
            )
                .into_response();
        }

        // Log server errors with Sentry
        if !matches!(self, Self::BadRequest(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Sync request error"
            );
        }

        // Don't expose internal error details to clients
        let (status, message) = match &self {
            Self::Sync(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to resume sync.".to_string(),
            ),
            Self::Export(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to sync orders.".to_string(),
            ),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
        };

        (status, message).into_response()
    }
}
