//! REST API endpoint handlers for the query server.
//!
//! All handlers read the current [`SwarmSnapshot`] through the shared
//! [`AppState`]. A read is a short borrow of the published reference; no
//! handler ever waits on the refresh loop.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/swarm_data` | Current robots, tasks, and allocations |
//! | `GET` | `/api/health` | Fixed liveness acknowledgment |
//! | `GET` | `/api/status` | Freshness, summary, and loop counters |
//! | `GET` | `/api/robots/:id` | One robot plus its assigned tasks |
//!
//! [`SwarmSnapshot`]: swarmscope_types::SwarmSnapshot

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse};
use axum::Json;
use chrono::Utc;
use swarmscope_types::{RobotId, SwarmReadings};

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing snapshot freshness and API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.current();
    let counters = state.reader.stats();

    let (sequence, captured_at, robots, tasks, completed) = snapshot.as_ref().map_or_else(
        || (0, String::from("never"), 0, 0, 0),
        |snap| {
            let summary = snap.summary();
            (
                snap.sequence,
                snap.captured_at.to_rfc3339(),
                summary.robots,
                summary.tasks,
                summary.completed_tasks,
            )
        },
    );
    let failures = counters.failures;
    let source = &state.source_name;
    let interval_ms = state.refresh_interval.as_millis();
    let status = if snapshot.is_some() { "LIVE" } else { "WAITING" };

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Swarmscope</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        a:hover {{ text-decoration: underline; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        li::before {{ content: "GET "; color: #7ee787; font-weight: bold; }}
        .status {{ color: #3fb950; font-weight: bold; }}
        hr {{ border: none; border-top: 1px solid #30363d; margin: 1.5rem 0; }}
    </style>
</head>
<body>
    <h1>Swarmscope</h1>
    <p class="subtitle">Swarm telemetry -- source: {source}, refresh every {interval_ms} ms</p>

    <p>Status: <span class="status">{status}</span> (captured {captured_at})</p>

    <div>
        <div class="metric">
            <div class="label">Snapshot</div>
            <div class="value">{sequence}</div>
        </div>
        <div class="metric">
            <div class="label">Robots</div>
            <div class="value">{robots}</div>
        </div>
        <div class="metric">
            <div class="label">Tasks</div>
            <div class="value">{tasks}</div>
        </div>
        <div class="metric">
            <div class="label">Completed</div>
            <div class="value">{completed}</div>
        </div>
        <div class="metric">
            <div class="label">Fetch failures</div>
            <div class="value">{failures}</div>
        </div>
    </div>

    <hr>

    <h2>API Endpoints</h2>
    <ul>
        <li><a href="/api/swarm_data">/api/swarm_data</a> -- Robots, tasks, and allocations</li>
        <li><a href="/api/status">/api/status</a> -- Freshness and refresh loop counters</li>
        <li><a href="/api/health">/api/health</a> -- Liveness</li>
        <li><a href="/api/robots/0">/api/robots/:id</a> -- Single robot with its tasks</li>
    </ul>

    <h2>WebSocket</h2>
    <ul>
        <li style="list-style:none;"><code>ws://host:port/ws/swarm</code> -- Live snapshot stream</li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /api/swarm_data -- current swarm state
// ---------------------------------------------------------------------------

/// Return the current robots, tasks, and allocations.
///
/// Before the first successful refresh this is the empty structure
/// (`{"robots": [], "tasks": [], "allocations": {}}`), never an error.
pub async fn get_swarm_data(State(state): State<Arc<AppState>>) -> Json<SwarmReadings> {
    let readings = state
        .current()
        .map(|snap| snap.readings.clone())
        .unwrap_or_default();
    Json(readings)
}

// ---------------------------------------------------------------------------
// GET /api/health -- liveness
// ---------------------------------------------------------------------------

/// Fixed liveness acknowledgment, independent of snapshot freshness.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// GET /api/status -- freshness and counters
// ---------------------------------------------------------------------------

/// Report snapshot freshness, a summary of its contents, and the refresh
/// loop's counters.
///
/// Callers that care about staleness should compare `captured_at` or
/// `age_ms` against their own tolerance; a failing upstream keeps serving
/// the last good snapshot.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ObserverError> {
    let snapshot = state.current();
    let now = Utc::now();

    let snapshot_json = match &snapshot {
        Some(snap) => serde_json::json!({
            "sequence": snap.sequence,
            "captured_at": snap.captured_at,
            "age_ms": snap.age_ms(now),
            "summary": serde_json::to_value(snap.summary())?,
        }),
        None => serde_json::Value::Null,
    };

    Ok(Json(serde_json::json!({
        "available": snapshot.is_some(),
        "snapshot": snapshot_json,
        "sync": serde_json::to_value(state.reader.stats())?,
        "source": state.source_name,
        "refresh_interval_ms": u64::try_from(state.refresh_interval.as_millis()).unwrap_or(u64::MAX),
        "started_at": state.started_at,
    })))
}

// ---------------------------------------------------------------------------
// GET /api/robots/:id -- single robot detail
// ---------------------------------------------------------------------------

/// Return one robot together with the task readings it is assigned,
/// resolved against the same snapshot.
pub async fn get_robot(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let id = parse_robot_id(&id_str)?;

    let snapshot = state
        .current()
        .ok_or_else(|| ObserverError::NotFound(String::from("no snapshot published yet")))?;

    let robot = snapshot
        .readings
        .robot(id)
        .ok_or_else(|| ObserverError::NotFound(format!("robot {id}")))?;

    let allocated: Vec<u32> = snapshot
        .readings
        .allocations
        .iter()
        .filter(|(_, owner)| **owner == id)
        .map(|(task_id, _)| task_id.into_inner())
        .collect();

    Ok(Json(serde_json::json!({
        "sequence": snapshot.sequence,
        "captured_at": snapshot.captured_at,
        "robot": serde_json::to_value(robot)?,
        "tasks": serde_json::to_value(snapshot.readings.tasks_of(id))?,
        "allocated_task_ids": allocated,
    })))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse a robot id from a path segment, returning an [`ObserverError`] on failure.
fn parse_robot_id(s: &str) -> Result<RobotId, ObserverError> {
    s.parse::<RobotId>()
        .map_err(|e| ObserverError::InvalidId(format!("{s}: {e}")))
}
