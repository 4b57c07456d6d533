//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /status                 - Run flag, current phase and checkpoint
//! GET  /resume                 - Sync every remaining page from the checkpoint
//! GET  /sync?limit=N           - Export up to N fulfilled orders to JSON
//! ```

mod status;
mod sync;

use axum::{Router, routing::get};

use crate::state::AppState;

/// Build the application router with state attached.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(status::router())
        .merge(sync::router())
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check upstream APIs.
async fn health() -> &'static str {
    "ok"
}
