//! Published snapshots and the summaries derived from them.
//!
//! A [`SwarmSnapshot`] wraps the readings of exactly one fetch together with
//! the time the synchronizer accepted them. Snapshots are shared behind
//! `Arc` and never mutated after construction; every refresh builds a new
//! one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::readings::SwarmReadings;

/// Immutable view of the swarm as captured by one successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SwarmSnapshot {
    /// Publish sequence number, starting at 1 and increasing by one per publish.
    pub sequence: u64,
    /// When the synchronizer accepted the readings.
    pub captured_at: DateTime<Utc>,
    /// The readings, flattened into the snapshot's JSON form.
    #[serde(flatten)]
    pub readings: SwarmReadings,
}

impl SwarmSnapshot {
    /// Wrap one fetch's readings into a snapshot.
    pub const fn capture(readings: SwarmReadings, captured_at: DateTime<Utc>, sequence: u64) -> Self {
        Self {
            sequence,
            captured_at,
            readings,
        }
    }

    /// Milliseconds elapsed between capture and `now`, clamped at zero.
    pub fn age_ms(&self, now: DateTime<Utc>) -> u64 {
        let millis = now.signed_duration_since(self.captured_at).num_milliseconds();
        u64::try_from(millis.max(0)).unwrap_or(0)
    }

    /// Derive the headline counts for status displays.
    pub fn summary(&self) -> SwarmSummary {
        SwarmSummary::of(&self.readings)
    }
}

/// Headline counts for one set of readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SwarmSummary {
    /// Number of robots reported.
    pub robots: usize,
    /// Number of tasks reported.
    pub tasks: usize,
    /// Tasks flagged completed.
    pub completed_tasks: usize,
    /// Tasks missing from the allocation map.
    pub unallocated_tasks: usize,
    /// Mean battery across robots, `None` for an empty swarm.
    pub mean_battery: Option<f64>,
}

impl SwarmSummary {
    /// Compute the summary for the given readings.
    #[allow(clippy::cast_precision_loss)]
    pub fn of(readings: &SwarmReadings) -> Self {
        let robots = readings.robots.len();
        let mean_battery = if robots == 0 {
            None
        } else {
            let total: f64 = readings.robots.iter().map(|r| r.battery).sum();
            Some(total / robots as f64)
        };

        Self {
            robots,
            tasks: readings.tasks.len(),
            completed_tasks: readings.completed_task_count(),
            unallocated_tasks: readings.unallocated_task_count(),
            mean_battery,
        }
    }
}
