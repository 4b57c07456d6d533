//! HTTP entry points driven through the axum router.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use ticket_ledger_core::{Order, OrderStatus};
use ticket_ledger_integration_tests::{FakeCommerce, MemorySheet, TestContext, order};
use ticket_ledger_sync::routes;
use ticket_ledger_sync::service::SyncPhase;
use ticket_ledger_sync::state::AppState;
use tokio::sync::Notify;
use tower::ServiceExt;

fn app(ctx: &TestContext) -> Router {
    routes::router(AppState::new(ctx.service.clone()))
}

async fn get(app: Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn shop() -> FakeCommerce {
    FakeCommerce::new()
        .with_show("p1", "Roundhouse", "London", "2024-06-01T19:30:00Z")
        .with_order(order("o1", OrderStatus::Fulfilled, &[("v1", "p1", 2)]))
        .with_order(order(
            "o2",
            OrderStatus::Fulfilled,
            &[("v1", "p1", 1), ("v1", "p1", 1)],
        ))
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_returns_ok() {
    let ctx = TestContext::new(FakeCommerce::new(), MemorySheet::new());

    let (status, body) = get(app(&ctx), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

// =============================================================================
// Resume
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_resume_reports_items_processed() {
    let ctx = TestContext::new(shop(), MemorySheet::new());

    let (status, body) = get(app(&ctx), "/resume").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Sync complete. Total items processed: 3");
    assert_eq!(ctx.sheet.tickets_for("v1").as_deref(), Some("4"));
}

#[tokio::test(start_paused = true)]
async fn test_resume_failure_hides_details() {
    let ctx = TestContext::new(shop().rate_limit_orders(u32::MAX), MemorySheet::new());

    let (status, body) = get(app(&ctx), "/resume").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Failed to resume sync.");
}

#[tokio::test(start_paused = true)]
async fn test_resume_while_running_conflicts() {
    let gate = Arc::new(Notify::new());
    let ctx = TestContext::new(shop().gated(gate.clone()), MemorySheet::new());

    let first = tokio::spawn(get(app(&ctx), "/resume"));
    while ctx.commerce.queries().is_empty() {
        tokio::task::yield_now().await;
    }

    let (status, body) = get(app(&ctx), "/resume").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, "A sync is already in progress.");

    gate.notify_one();
    let (status, _) = first.await.unwrap();
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn test_resume_keeps_running_after_client_disconnects() {
    let commerce = shop().with_order(order("o3", OrderStatus::Fulfilled, &[("v1", "p1", 5)]));
    let ctx = TestContext::new(commerce, MemorySheet::new());

    // The client gives up during the first page delay.
    let request = app(&ctx).oneshot(
        Request::builder()
            .uri("/resume")
            .body(Body::empty())
            .unwrap(),
    );
    assert!(
        tokio::time::timeout(Duration::from_secs(30), request)
            .await
            .is_err()
    );
    assert!(ctx.service.is_running());

    while ctx.service.is_running() {
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    assert_eq!(ctx.sheet.tickets_for("v1").as_deref(), Some("9"));
    assert_eq!(ctx.checkpoint().load().await.last_processed, 3);
    assert_eq!(
        ctx.service.status().await.phase,
        SyncPhase::Done { items_processed: 4 }
    );
}

#[tokio::test(start_paused = true)]
async fn test_resume_conflicts_when_checkpoint_locked_by_another_process() {
    let ctx = TestContext::new(shop(), MemorySheet::new());
    let held = ctx.checkpoint().lock().unwrap();

    let (status, body) = get(app(&ctx), "/resume").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, "A sync is already in progress.");
    assert!(ctx.commerce.queries().is_empty());

    drop(held);
    let (status, _) = get(app(&ctx), "/resume").await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Status
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_status_before_and_after_run() {
    let ctx = TestContext::new(shop(), MemorySheet::new());

    let (status, body) = get(app(&ctx), "/status").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "running": false,
            "phase": {"state": "idle"},
            "checkpoint": {"lastProcessed": 0}
        })
    );

    get(app(&ctx), "/resume").await;

    let (_, body) = get(app(&ctx), "/status").await;
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "running": false,
            "phase": {"state": "done", "items_processed": 3},
            "checkpoint": {"lastProcessed": 2}
        })
    );
}

// =============================================================================
// Export
// =============================================================================

#[tokio::test]
async fn test_export_writes_fulfilled_orders() {
    let commerce = shop().with_order(order("o3", OrderStatus::Refunded, &[("v1", "p1", 9)]));
    let ctx = TestContext::new(commerce, MemorySheet::new());
    let path = ctx.service.settings().export_path.clone();

    let (status, body) = get(app(&ctx), "/sync").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        format!("Synced 2 fulfilled orders and saved to {}", path.display())
    );

    let saved: Vec<Order> = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    let ids: Vec<&str> = saved.iter().map(|o| o.order_id.as_str()).collect();
    assert_eq!(ids, vec!["o1", "o2"]);

    // The export leaves the sheet and the checkpoint alone.
    assert_eq!(ctx.sheet.rows().len(), 1);
    assert!(!ctx.checkpoint().path().exists());
}

#[tokio::test]
async fn test_export_pages_until_limit() {
    let commerce = (0..25).fold(FakeCommerce::new(), |shop, n| {
        shop.with_order(order(&format!("o{n}"), OrderStatus::Fulfilled, &[]))
    });
    let ctx = TestContext::new(commerce, MemorySheet::new());

    let (status, body) = get(app(&ctx), "/sync?limit=12").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("Synced 12 fulfilled orders"));

    let offsets: Vec<u32> = ctx.commerce.queries().iter().map(|q| q.offset).collect();
    assert_eq!(offsets, vec![0, 10]);
    assert!(ctx.commerce.queries().iter().all(|q| q.limit == 10));
}

#[tokio::test]
async fn test_export_defaults_to_all_available_below_limit() {
    let commerce = (0..25).fold(FakeCommerce::new(), |shop, n| {
        shop.with_order(order(&format!("o{n}"), OrderStatus::Fulfilled, &[]))
    });
    let ctx = TestContext::new(commerce, MemorySheet::new());

    let (status, body) = get(app(&ctx), "/sync").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("Synced 25 fulfilled orders"));
    assert_eq!(ctx.commerce.queries().len(), 3);
}

#[tokio::test]
async fn test_export_rejects_zero_limit() {
    let ctx = TestContext::new(shop(), MemorySheet::new());

    let (status, _) = get(app(&ctx), "/sync?limit=0").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(ctx.commerce.queries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_export_failure_hides_details() {
    let ctx = TestContext::new(shop().rate_limit_orders(u32::MAX), MemorySheet::new());

    let (status, body) = get(app(&ctx), "/sync").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Failed to sync orders.");
}
