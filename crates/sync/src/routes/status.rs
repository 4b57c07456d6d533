//! Sync status route.

use axum::{Json, Router, extract::State, routing::get};

use crate::service::SyncStatus;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/status", get(status))
}

async fn status(State(state): State<AppState>) -> Json<SyncStatus> {
    Json(state.sync().status().await)
}
