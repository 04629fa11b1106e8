//! Shared application state for the query API server.
//!
//! [`AppState`] carries a [`SnapshotReader`] handed out by the state
//! synchronizer. Handlers never touch the refresh loop directly; they only
//! read whatever snapshot is current, so a slow upstream can never stall a
//! request.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use swarmscope_core::SnapshotReader;
use swarmscope_types::SwarmSnapshot;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Read handle onto the published snapshot.
    pub reader: SnapshotReader,
    /// Configured refresh interval, reported on the status endpoint.
    pub refresh_interval: Duration,
    /// Name of the backing data source, reported on the status endpoint.
    pub source_name: String,
    /// When the server state was created.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create application state around a snapshot reader.
    pub fn new(reader: SnapshotReader, refresh_interval: Duration, source_name: impl Into<String>) -> Self {
        Self {
            reader,
            refresh_interval,
            source_name: source_name.into(),
            started_at: Utc::now(),
        }
    }

    /// The latest published snapshot, if any.
    pub fn current(&self) -> Option<Arc<SwarmSnapshot>> {
        self.reader.current()
    }
}
