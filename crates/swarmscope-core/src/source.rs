//! Data source trait and the bundled implementations.
//!
//! The synchronizer asks a [`DataSource`] for one reading per tick. The
//! trait abstracts where readings come from -- a live swarm controller, a
//! simulator, or a recorded replay. Whatever goes wrong inside a source is
//! reported as a single opaque [`FetchFailure`].
//!
//! Bundled sources:
//!
//! - [`SimulatedDataSource`] -- deterministic generator driven by a tick counter
//! - [`ReplayDataSource`] -- cycles through recorded frames loaded from JSON
//! - [`SwarmSource`] -- enum dispatch over the two, chosen by configuration

use std::future::{self, Future};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use swarmscope_types::{Allocation, RobotId, RobotReading, SwarmReadings, TaskId, TaskReading};

/// Default number of robots and tasks produced by the simulator.
pub const DEFAULT_SIMULATED_ENTITIES: u32 = 5;

/// A data source could not produce a reading.
///
/// Deliberately opaque: unreachable processes, malformed responses, and
/// timeouts all collapse into this one error at the source boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("fetch failed: {message}")]
pub struct FetchFailure {
    message: String,
}

impl FetchFailure {
    /// Create a failure carrying a human-readable description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure description.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A provider of swarm readings.
///
/// Implementations must be safe to call repeatedly and must not expose
/// partially buffered state between calls: every successful fetch returns
/// a complete, owned [`SwarmReadings`]. A source that can hang is
/// responsible for its own timeout and reports it as a [`FetchFailure`].
pub trait DataSource: Send + Sync {
    /// Fetch the current readings.
    ///
    /// # Errors
    ///
    /// Returns [`FetchFailure`] if no reading could be produced.
    fn fetch(&self) -> impl Future<Output = Result<SwarmReadings, FetchFailure>> + Send;
}

// ---------------------------------------------------------------------------
// Simulated source
// ---------------------------------------------------------------------------

/// Deterministic generator of `n` robots and `n` tasks.
///
/// Robot `i` sits at `(10i, 15i)` with battery `100 - 10i` and owns task
/// `i`; task `i` sits at `(20i, 25i)`. With a non-zero drift, robot
/// positions shift by `drift * tick` on both axes so a dashboard shows
/// motion. The output is a pure function of the tick index, see
/// [`readings_at`](Self::readings_at).
#[derive(Debug)]
pub struct SimulatedDataSource {
    entities: u32,
    drift: f64,
    tick: AtomicU64,
}

impl SimulatedDataSource {
    /// Create a simulator producing `entities` robots and tasks.
    pub const fn new(entities: u32) -> Self {
        Self {
            entities,
            drift: 0.0,
            tick: AtomicU64::new(0),
        }
    }

    /// Set the per-tick positional drift applied to robots.
    #[must_use]
    pub fn with_drift(mut self, drift: f64) -> Self {
        self.drift = drift;
        self
    }

    /// Number of robots and tasks generated per reading.
    pub const fn entities(&self) -> u32 {
        self.entities
    }

    /// Number of readings served so far.
    pub fn ticks_served(&self) -> u64 {
        self.tick.load(Ordering::Acquire)
    }

    /// Produce the readings for a given tick. Pure.
    #[allow(clippy::cast_precision_loss)]
    pub fn readings_at(&self, tick: u64) -> SwarmReadings {
        let offset = self.drift * tick as f64;

        let robots = (0..self.entities)
            .map(|i| {
                let i_f = f64::from(i);
                RobotReading {
                    id: RobotId(i),
                    x: i_f.mul_add(10.0, offset),
                    y: i_f.mul_add(15.0, offset),
                    battery: i_f.mul_add(-10.0, 100.0),
                    assigned_task_ids: vec![TaskId(i)],
                }
            })
            .collect();

        let tasks = (0..self.entities)
            .map(|i| {
                let i_f = f64::from(i);
                TaskReading {
                    id: TaskId(i),
                    x: i_f * 20.0,
                    y: i_f * 25.0,
                    completed: false,
                }
            })
            .collect();

        let allocations: Allocation = (0..self.entities).map(|i| (TaskId(i), RobotId(i))).collect();

        SwarmReadings {
            robots,
            tasks,
            allocations,
        }
    }

    fn next_reading(&self) -> SwarmReadings {
        let tick = self.tick.fetch_add(1, Ordering::AcqRel);
        self.readings_at(tick)
    }
}

impl Default for SimulatedDataSource {
    fn default() -> Self {
        Self::new(DEFAULT_SIMULATED_ENTITIES)
    }
}

impl DataSource for SimulatedDataSource {
    fn fetch(&self) -> impl Future<Output = Result<SwarmReadings, FetchFailure>> + Send {
        future::ready(Ok(self.next_reading()))
    }
}

// ---------------------------------------------------------------------------
// Replay source
// ---------------------------------------------------------------------------

/// Errors that can occur when loading a replay recording.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// The recording file could not be read.
    #[error("failed to read replay file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The recording is not a JSON array of swarm readings.
    #[error("failed to parse replay file: {source}")]
    Json {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}

/// Replays recorded frames in order, wrapping around at the end.
///
/// A recording is a JSON array whose elements use the swarm-state wire
/// format. An empty recording fails every fetch.
#[derive(Debug)]
pub struct ReplayDataSource {
    frames: Vec<SwarmReadings>,
    cursor: AtomicU64,
}

impl ReplayDataSource {
    /// Create a replay source over in-memory frames.
    pub const fn new(frames: Vec<SwarmReadings>) -> Self {
        Self {
            frames,
            cursor: AtomicU64::new(0),
        }
    }

    /// Load a recording from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ReplayError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse a recording from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::Json`] if the string is not an array of frames.
    pub fn parse(json: &str) -> Result<Self, ReplayError> {
        let frames: Vec<SwarmReadings> = serde_json::from_str(json)?;
        Ok(Self::new(frames))
    }

    /// Number of recorded frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn next_frame(&self) -> Result<SwarmReadings, FetchFailure> {
        let len = u64::try_from(self.frames.len()).unwrap_or(u64::MAX);
        let position = self.cursor.fetch_add(1, Ordering::AcqRel);
        let index = position
            .checked_rem(len)
            .and_then(|i| usize::try_from(i).ok())
            .ok_or_else(|| FetchFailure::new("replay recording is empty"))?;

        self.frames
            .get(index)
            .cloned()
            .ok_or_else(|| FetchFailure::new(format!("replay frame {index} out of range")))
    }
}

impl DataSource for ReplayDataSource {
    fn fetch(&self) -> impl Future<Output = Result<SwarmReadings, FetchFailure>> + Send {
        future::ready(self.next_frame())
    }
}

// ---------------------------------------------------------------------------
// Configured source
// ---------------------------------------------------------------------------

/// The data source selected at startup.
///
/// Enum dispatch keeps the synchronizer monomorphic over one concrete type
/// while still letting configuration pick the backend.
#[derive(Debug)]
pub enum SwarmSource {
    /// Deterministic simulator.
    Simulated(SimulatedDataSource),
    /// Recorded replay.
    Replay(ReplayDataSource),
}

impl SwarmSource {
    /// Short backend name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Simulated(_) => "simulated",
            Self::Replay(_) => "replay",
        }
    }
}

impl DataSource for SwarmSource {
    fn fetch(&self) -> impl Future<Output = Result<SwarmReadings, FetchFailure>> + Send {
        let result = match self {
            Self::Simulated(sim) => Ok(sim.next_reading()),
            Self::Replay(replay) => replay.next_frame(),
        };
        future::ready(result)
    }
}
