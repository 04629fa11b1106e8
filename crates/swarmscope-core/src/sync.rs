//! State synchronizer: the refresh loop and the published snapshot.
//!
//! [`StateSynchronizer`] owns exactly one background refresh loop and the
//! single "current snapshot" reference. The loop polls a [`DataSource`] on
//! a fixed interval; each successful fetch is wrapped into a brand-new
//! [`SwarmSnapshot`] and published with one atomic swap. Readers obtain the
//! latest snapshot through [`StateSynchronizer::current`] or a cloneable
//! [`SnapshotReader`] and never see a mix of two fetches.
//!
//! # Lifecycle
//!
//! ```text
//! Idle --start()--> Running --stop()--> Stopped
//!   \______________stop()______________/
//! ```
//!
//! - **Idle**: no loop, nothing published; `current()` is `None`.
//! - **Running**: one loop task. Fetch failures are logged and the previous
//!   snapshot stays current; the next tick is scheduled regardless.
//! - **Stopped**: terminal. The last snapshot remains readable but never
//!   changes again.
//!
//! # Publication
//!
//! The current reference lives in a [`tokio::sync::watch`] channel. The
//! loop builds the complete snapshot first, then calls `send_replace`;
//! readers take a brief read borrow and clone the `Arc`. No lock is held
//! while a fetch is in flight.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use swarmscope_types::SwarmSnapshot;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::source::DataSource;

/// Channel payload: `None` until the first successful fetch.
type Published = Option<Arc<SwarmSnapshot>>;

/// Errors returned by synchronizer lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The refresh interval was zero.
    #[error("refresh interval must be a positive duration")]
    InvalidInterval,

    /// The synchronizer was already stopped; stopping is terminal.
    #[error("synchronizer has been stopped and cannot be restarted")]
    Stopped,

    /// `start` was called outside a Tokio runtime.
    #[error("no tokio runtime available: {message}")]
    NoRuntime {
        /// Description of the runtime lookup failure.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Phase and counters
// ---------------------------------------------------------------------------

/// Lifecycle phase of a synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// Constructed, loop not started.
    Idle,
    /// Refresh loop active.
    Running,
    /// Loop exited after `stop()`.
    Stopped,
}

impl SyncPhase {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Running => 1,
            Self::Stopped => 2,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Running,
            2 => Self::Stopped,
            _ => Self::Idle,
        }
    }
}

/// Point-in-time copy of the synchronizer's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncCounters {
    /// Current lifecycle phase.
    pub phase: SyncPhase,
    /// Fetches started.
    pub fetch_attempts: u64,
    /// Snapshots published.
    pub publishes: u64,
    /// Fetches that returned a failure.
    pub failures: u64,
    /// Failures since the last successful publish.
    pub consecutive_failures: u64,
}

/// Lock-free counters shared between the loop and readers.
#[derive(Debug, Default)]
struct SyncStats {
    phase: AtomicU8,
    fetch_attempts: AtomicU64,
    publishes: AtomicU64,
    failures: AtomicU64,
    consecutive_failures: AtomicU64,
}

impl SyncStats {
    fn set_phase(&self, phase: SyncPhase) {
        self.phase.store(phase.as_u8(), Ordering::Release);
    }

    fn phase(&self) -> SyncPhase {
        SyncPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn record_attempt(&self) {
        self.fetch_attempts.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns the sequence number of the publish being recorded.
    fn record_publish(&self) -> u64 {
        self.consecutive_failures.store(0, Ordering::Release);
        self.publishes
            .fetch_add(1, Ordering::AcqRel)
            .saturating_add(1)
    }

    /// Returns the number of consecutive failures including this one.
    fn record_failure(&self) -> u64 {
        self.failures.fetch_add(1, Ordering::AcqRel);
        self.consecutive_failures
            .fetch_add(1, Ordering::AcqRel)
            .saturating_add(1)
    }

    fn counters(&self) -> SyncCounters {
        SyncCounters {
            phase: self.phase(),
            fetch_attempts: self.fetch_attempts.load(Ordering::Acquire),
            publishes: self.publishes.load(Ordering::Acquire),
            failures: self.failures.load(Ordering::Acquire),
            consecutive_failures: self.consecutive_failures.load(Ordering::Acquire),
        }
    }
}

// ---------------------------------------------------------------------------
// Stop signal
// ---------------------------------------------------------------------------

/// Level-triggered stop request that also wakes a sleeping loop.
#[derive(Debug, Default)]
struct StopSignal {
    requested: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    fn request(&self) {
        self.requested.store(true, Ordering::Release);
        // notify_one stores a permit, so a loop that is not yet waiting
        // still observes the request.
        self.notify.notify_one();
    }

    fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    async fn wait(&self) {
        while !self.is_requested() {
            self.notify.notified().await;
        }
    }
}

// ---------------------------------------------------------------------------
// Reader handle
// ---------------------------------------------------------------------------

/// Cloneable read-only handle onto a synchronizer's published snapshot.
///
/// This is what the query layer holds. It never blocks on a refresh and
/// keeps working after the synchronizer is stopped or dropped, returning
/// the last published snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    rx: watch::Receiver<Published>,
    stats: Arc<SyncStats>,
}

impl SnapshotReader {
    /// The latest published snapshot, or `None` if nothing has been
    /// published yet.
    pub fn current(&self) -> Option<Arc<SwarmSnapshot>> {
        self.rx.borrow().clone()
    }

    /// Current lifecycle phase and counters.
    pub fn stats(&self) -> SyncCounters {
        self.stats.counters()
    }

    /// A receiver that is notified on every publish.
    ///
    /// The receiver starts with the current value marked as seen.
    pub fn subscribe(&self) -> watch::Receiver<Published> {
        let mut rx = self.rx.clone();
        rx.mark_unchanged();
        rx
    }
}

// ---------------------------------------------------------------------------
// Synchronizer
// ---------------------------------------------------------------------------

/// Handle to a running loop task.
struct RefreshWorker {
    stop: Arc<StopSignal>,
    handle: JoinHandle<()>,
}

enum Lifecycle {
    Idle,
    Running(RefreshWorker),
    Stopped,
}

/// Drives the refresh loop and owns the published snapshot.
///
/// Construct one per data source and inject its [`SnapshotReader`] into
/// whatever serves the snapshot; there is no process-wide state.
pub struct StateSynchronizer<S> {
    source: Arc<S>,
    clock: Arc<dyn Clock>,
    publisher: Arc<watch::Sender<Published>>,
    stats: Arc<SyncStats>,
    lifecycle: Mutex<Lifecycle>,
}

impl<S> StateSynchronizer<S>
where
    S: DataSource + 'static,
{
    /// Create an idle synchronizer stamping snapshots with the system clock.
    pub fn new(source: S) -> Self {
        Self::with_clock(source, Arc::new(SystemClock))
    }

    /// Create an idle synchronizer with an explicit clock.
    pub fn with_clock(source: S, clock: Arc<dyn Clock>) -> Self {
        let (publisher, _) = watch::channel(None);
        Self {
            source: Arc::new(source),
            clock,
            publisher: Arc::new(publisher),
            stats: Arc::new(SyncStats::default()),
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    /// The data source this synchronizer polls.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Start the refresh loop.
    ///
    /// The first fetch happens immediately; each later fetch follows the
    /// previous one by `interval`. Calling `start` while already running is
    /// a no-op, so at most one loop ever exists per synchronizer.
    ///
    /// # Errors
    ///
    /// - [`SyncError::InvalidInterval`] if `interval` is zero.
    /// - [`SyncError::Stopped`] if [`stop`](Self::stop) was already called.
    /// - [`SyncError::NoRuntime`] if called outside a Tokio runtime.
    pub async fn start(&self, interval: Duration) -> Result<(), SyncError> {
        if interval.is_zero() {
            return Err(SyncError::InvalidInterval);
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| SyncError::NoRuntime {
            message: e.to_string(),
        })?;

        let mut lifecycle = self.lifecycle.lock().await;
        match *lifecycle {
            Lifecycle::Running(_) => {
                debug!("Refresh loop already running, start ignored");
                return Ok(());
            }
            Lifecycle::Stopped => return Err(SyncError::Stopped),
            Lifecycle::Idle => {}
        }

        let stop = Arc::new(StopSignal::default());
        let refresh = RefreshLoop {
            source: Arc::clone(&self.source),
            clock: Arc::clone(&self.clock),
            publisher: Arc::clone(&self.publisher),
            stats: Arc::clone(&self.stats),
            stop: Arc::clone(&stop),
            interval,
        };

        self.stats.set_phase(SyncPhase::Running);
        let handle = runtime.spawn(refresh.run());
        *lifecycle = Lifecycle::Running(RefreshWorker { stop, handle });

        info!(
            interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            "State synchronizer started"
        );
        Ok(())
    }

    /// Stop the refresh loop and wait for it to exit.
    ///
    /// A sleeping loop wakes immediately. A fetch already in flight is
    /// allowed to finish but its result is discarded. After this returns no
    /// further snapshot is published. Idempotent; stopping an idle
    /// synchronizer moves it straight to Stopped.
    pub async fn stop(&self) {
        let worker = {
            let mut lifecycle = self.lifecycle.lock().await;
            match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
                Lifecycle::Running(worker) => Some(worker),
                Lifecycle::Idle | Lifecycle::Stopped => None,
            }
        };

        let Some(worker) = worker else {
            self.stats.set_phase(SyncPhase::Stopped);
            return;
        };

        worker.stop.request();
        if let Err(e) = worker.handle.await {
            warn!(error = %e, "Refresh loop task ended abnormally");
        }
        self.stats.set_phase(SyncPhase::Stopped);

        let counters = self.stats.counters();
        info!(
            publishes = counters.publishes,
            failures = counters.failures,
            "State synchronizer stopped"
        );
    }

    /// The latest published snapshot, or `None` if none is available yet.
    pub fn current(&self) -> Option<Arc<SwarmSnapshot>> {
        self.publisher.borrow().clone()
    }

    /// A cloneable read handle for the query layer.
    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            rx: self.publisher.subscribe(),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SyncPhase {
        self.stats.phase()
    }

    /// Current lifecycle phase and counters.
    pub fn stats(&self) -> SyncCounters {
        self.stats.counters()
    }
}

impl<S> Drop for StateSynchronizer<S> {
    fn drop(&mut self) {
        // Dropping without stop() must not leave the loop running forever.
        if let Lifecycle::Running(worker) = self.lifecycle.get_mut() {
            worker.stop.request();
        }
    }
}

// ---------------------------------------------------------------------------
// Refresh loop
// ---------------------------------------------------------------------------

/// Everything the background task needs, moved into it at start.
struct RefreshLoop<S> {
    source: Arc<S>,
    clock: Arc<dyn Clock>,
    publisher: Arc<watch::Sender<Published>>,
    stats: Arc<SyncStats>,
    stop: Arc<StopSignal>,
    interval: Duration,
}

impl<S: DataSource> RefreshLoop<S> {
    async fn run(self) {
        loop {
            if self.stop.is_requested() {
                break;
            }

            self.tick().await;

            tokio::select! {
                () = self.stop.wait() => break,
                () = tokio::time::sleep(self.interval) => {}
            }
        }
        debug!("Refresh loop exited");
    }

    /// One fetch-and-publish cycle. Failures are contained here.
    async fn tick(&self) {
        self.stats.record_attempt();

        match self.source.fetch().await {
            Ok(readings) => {
                if self.stop.is_requested() {
                    debug!("Stop requested during fetch, reading discarded");
                    return;
                }
                let sequence = self.stats.record_publish();
                let snapshot = SwarmSnapshot::capture(readings, self.clock.now(), sequence);
                let robots = snapshot.readings.robots.len();
                let tasks = snapshot.readings.tasks.len();
                self.publisher.send_replace(Some(Arc::new(snapshot)));
                debug!(sequence, robots, tasks, "Snapshot published");
            }
            Err(failure) => {
                let consecutive = self.stats.record_failure();
                warn!(
                    error = %failure,
                    consecutive_failures = consecutive,
                    "Swarm fetch failed, keeping previous snapshot"
                );
            }
        }
    }
}
