//! Shared type definitions for the Swarmscope telemetry service.
//!
//! Everything a data source reports and everything the query interface
//! serves is defined here, so the synchronizer and the HTTP layer agree on
//! one wire format. Types are exported to `TypeScript` via `ts-rs` for the
//! visualization front end.
//!
//! # Modules
//!
//! - [`ids`] -- Typed robot and task identifiers
//! - [`readings`] -- Robot, task, and allocation readings from one fetch
//! - [`snapshot`] -- Immutable published snapshots and their summaries

pub mod ids;
pub mod readings;
pub mod snapshot;

// Re-export all public types at crate root for convenience.
pub use ids::{RobotId, TaskId};
pub use readings::{Allocation, RobotReading, SwarmReadings, TaskReading};
pub use snapshot::{SwarmSnapshot, SwarmSummary};
