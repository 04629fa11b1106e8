//! Axum router construction for the query API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the query server.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /ws/swarm` -- `WebSocket` snapshot stream
/// - `GET /api/swarm_data` -- current robots, tasks, and allocations
/// - `GET /api/health` -- liveness
/// - `GET /api/status` -- freshness and refresh loop counters
/// - `GET /api/robots/:id` -- single robot with its tasks
///
/// CORS allows any origin so a dashboard can be served from elsewhere.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index))
        // WebSocket
        .route("/ws/swarm", get(ws::ws_swarm))
        // REST API
        .route("/api/swarm_data", get(handlers::get_swarm_data))
        .route("/api/health", get(handlers::health))
        .route("/api/status", get(handlers::get_status))
        .route("/api/robots/{id}", get(handlers::get_robot))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
