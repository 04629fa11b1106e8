//! Integration tests for the query API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. Snapshots come from a real synchronizer driven by
//! the simulator, on Tokio's paused clock.

#![allow(clippy::unwrap_used)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use swarmscope_core::source::SimulatedDataSource;
use swarmscope_core::{DataSource, FetchFailure, StateSynchronizer};
use swarmscope_observer::router::build_router;
use swarmscope_observer::state::AppState;
use swarmscope_types::SwarmReadings;
use tower::ServiceExt;

const INTERVAL: Duration = Duration::from_millis(100);

struct BrokenLink;

impl DataSource for BrokenLink {
    fn fetch(&self) -> impl Future<Output = Result<SwarmReadings, FetchFailure>> + Send {
        async { Err(FetchFailure::new("link down")) }
    }
}

fn state_for<S: DataSource + 'static>(sync: &StateSynchronizer<S>, source: &str) -> Arc<AppState> {
    Arc::new(AppState::new(sync.reader(), INTERVAL, source))
}

/// Start a simulator-backed synchronizer and wait for its first publish.
async fn published_state() -> (StateSynchronizer<SimulatedDataSource>, Arc<AppState>) {
    let sync = StateSynchronizer::new(SimulatedDataSource::new(5));
    let mut rx = sync.reader().subscribe();
    sync.start(INTERVAL).await.unwrap();
    rx.changed().await.unwrap();
    let state = state_for(&sync, "simulated");
    (sync, state)
}

async fn get(state: Arc<AppState>, uri: &str) -> (StatusCode, Vec<u8>) {
    let app = build_router(state);
    let response = app
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn get_json(state: Arc<AppState>, uri: &str) -> (StatusCode, Value) {
    let (status, body) = get(state, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

// =========================================================================
// /api/swarm_data
// =========================================================================

#[tokio::test(start_paused = true)]
async fn swarm_data_is_empty_structure_before_first_publish() {
    let sync = StateSynchronizer::new(SimulatedDataSource::new(5));
    let state = state_for(&sync, "simulated");

    let (status, json) = get_json(state, "/api/swarm_data").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"robots": [], "tasks": [], "allocations": {}}));
}

#[tokio::test(start_paused = true)]
async fn swarm_data_serves_published_snapshot() {
    let (sync, state) = published_state().await;

    let (status, json) = get_json(state, "/api/swarm_data").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        json!({
            "robots": [
                {"id": 0, "x": 0.0, "y": 0.0, "battery": 100.0, "tasks": [0]},
                {"id": 1, "x": 10.0, "y": 15.0, "battery": 90.0, "tasks": [1]},
                {"id": 2, "x": 20.0, "y": 30.0, "battery": 80.0, "tasks": [2]},
                {"id": 3, "x": 30.0, "y": 45.0, "battery": 70.0, "tasks": [3]},
                {"id": 4, "x": 40.0, "y": 60.0, "battery": 60.0, "tasks": [4]}
            ],
            "tasks": [
                {"id": 0, "x": 0.0, "y": 0.0, "completed": false},
                {"id": 1, "x": 20.0, "y": 25.0, "completed": false},
                {"id": 2, "x": 40.0, "y": 50.0, "completed": false},
                {"id": 3, "x": 60.0, "y": 75.0, "completed": false},
                {"id": 4, "x": 80.0, "y": 100.0, "completed": false}
            ],
            "allocations": {"0": 0, "1": 1, "2": 2, "3": 3, "4": 4}
        })
    );

    sync.stop().await;
}

#[tokio::test(start_paused = true)]
async fn swarm_data_survives_synchronizer_stop() {
    let (sync, state) = published_state().await;
    sync.stop().await;

    let (status, json) = get_json(state, "/api/swarm_data").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["robots"].as_array().unwrap().len(), 5);
}

// =========================================================================
// /api/health
// =========================================================================

#[tokio::test(start_paused = true)]
async fn health_is_fixed_even_while_upstream_fails() {
    let sync = StateSynchronizer::new(BrokenLink);
    sync.start(INTERVAL).await.unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;
    let state = state_for(&sync, "broken");

    let (status, json) = get_json(state, "/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"status": "ok"}));

    sync.stop().await;
}

// =========================================================================
// /api/status
// =========================================================================

#[tokio::test(start_paused = true)]
async fn status_reports_unavailable_and_failures() {
    let sync = StateSynchronizer::new(BrokenLink);
    sync.start(INTERVAL).await.unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;
    let state = state_for(&sync, "broken");

    let (status, json) = get_json(state, "/api/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["available"], json!(false));
    assert!(json["snapshot"].is_null());
    assert_eq!(json["source"], json!("broken"));
    assert_eq!(json["refresh_interval_ms"], json!(100));
    assert_eq!(json["sync"]["phase"], json!("running"));
    assert_eq!(json["sync"]["publishes"], json!(0));
    assert!(json["sync"]["failures"].as_u64().unwrap() >= 3);
    assert_eq!(
        json["sync"]["failures"],
        json["sync"]["consecutive_failures"]
    );

    sync.stop().await;
}

#[tokio::test(start_paused = true)]
async fn status_reports_snapshot_summary() {
    let (sync, state) = published_state().await;

    let (status, json) = get_json(state, "/api/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["available"], json!(true));
    assert!(json["snapshot"]["sequence"].as_u64().unwrap() >= 1);
    assert_eq!(json["snapshot"]["summary"]["robots"], json!(5));
    assert_eq!(json["snapshot"]["summary"]["tasks"], json!(5));
    assert_eq!(json["snapshot"]["summary"]["completed_tasks"], json!(0));
    assert_eq!(json["snapshot"]["summary"]["unallocated_tasks"], json!(0));
    assert_eq!(json["snapshot"]["summary"]["mean_battery"], json!(80.0));
    assert!(json["snapshot"]["captured_at"].is_string());
    assert_eq!(json["sync"]["consecutive_failures"], json!(0));

    sync.stop().await;
}

// =========================================================================
// /api/robots/:id
// =========================================================================

#[tokio::test(start_paused = true)]
async fn robot_detail_includes_assigned_tasks() {
    let (sync, state) = published_state().await;

    let (status, json) = get_json(state, "/api/robots/2").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json["robot"],
        json!({"id": 2, "x": 20.0, "y": 30.0, "battery": 80.0, "tasks": [2]})
    );
    assert_eq!(
        json["tasks"],
        json!([{"id": 2, "x": 40.0, "y": 50.0, "completed": false}])
    );
    assert_eq!(json["allocated_task_ids"], json!([2]));

    sync.stop().await;
}

#[tokio::test(start_paused = true)]
async fn unknown_robot_is_not_found() {
    let (sync, state) = published_state().await;

    let (status, json) = get_json(state, "/api/robots/99").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], json!(404));

    sync.stop().await;
}

#[tokio::test(start_paused = true)]
async fn robot_before_first_publish_is_not_found() {
    let sync = StateSynchronizer::new(SimulatedDataSource::new(5));
    let state = state_for(&sync, "simulated");

    let (status, _) = get_json(state, "/api/robots/0").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn malformed_robot_id_is_bad_request() {
    let (sync, state) = published_state().await;

    let (status, json) = get_json(state, "/api/robots/not-a-number").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], json!(400));

    sync.stop().await;
}

// =========================================================================
// Misc
// =========================================================================

#[tokio::test(start_paused = true)]
async fn index_page_renders_html() {
    let (sync, state) = published_state().await;

    let (status, body) = get(state, "/").await;
    let html = String::from_utf8(body).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Swarmscope"));
    assert!(html.contains("LIVE"));
    assert!(html.contains("/api/swarm_data"));

    sync.stop().await;
}

#[tokio::test(start_paused = true)]
async fn unknown_route_is_not_found() {
    let sync = StateSynchronizer::new(SimulatedDataSource::new(5));
    let state = state_for(&sync, "simulated");

    let (status, _) = get(state, "/api/nope").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
