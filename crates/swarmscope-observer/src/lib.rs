//! Query API server for Swarmscope.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **REST endpoints** for the current swarm state, liveness, snapshot
//!   freshness, and single-robot detail
//! - **`WebSocket` endpoint** (`/ws/swarm`) pushing every newly published
//!   snapshot
//! - **Minimal HTML page** (`GET /`) showing snapshot freshness and links
//!   to the API
//!
//! # Architecture
//!
//! Every handler reads through a [`SnapshotReader`] held in [`AppState`].
//! Reads clone a reference to the immutable published snapshot, so a
//! request never blocks on the refresh loop and always sees one coherent
//! fetch.
//!
//! [`SnapshotReader`]: swarmscope_core::SnapshotReader

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use error::ObserverError;
pub use router::build_router;
pub use server::{serve, start_server, ServerConfig, ServerError};
pub use state::AppState;
