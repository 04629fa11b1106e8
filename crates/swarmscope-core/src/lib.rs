//! Data sources, configuration, and the state synchronization loop for
//! Swarmscope.
//!
//! This crate owns the part of the service with real concurrency
//! constraints: producing a coherent swarm snapshot on a fixed cadence and
//! handing it to any number of concurrent readers without tearing.
//!
//! # Modules
//!
//! - [`clock`] -- Wall-clock abstraction for capture timestamps.
//! - [`config`] -- Key-to-value configuration with per-key validation.
//! - [`source`] -- [`DataSource`] trait, simulator, and replay source.
//! - [`sync`] -- [`StateSynchronizer`] refresh loop and [`SnapshotReader`].
//!
//! [`DataSource`]: source::DataSource
//! [`StateSynchronizer`]: sync::StateSynchronizer
//! [`SnapshotReader`]: sync::SnapshotReader

pub mod clock;
pub mod config;
pub mod source;
pub mod sync;

pub use source::{DataSource, FetchFailure};
pub use sync::{SnapshotReader, StateSynchronizer, SyncError};
