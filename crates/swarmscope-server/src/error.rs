//! Error types for the service binary.
//!
//! [`LaunchError`] wraps every failure that can abort startup or serving,
//! giving `main` a single type to propagate with `?`.

/// Top-level error for the service binary.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    /// The state synchronizer refused to start.
    #[error("synchronizer error: {source}")]
    Sync {
        /// The underlying synchronizer error.
        #[from]
        source: swarmscope_core::SyncError,
    },

    /// The query server failed to bind or serve.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: swarmscope_observer::ServerError,
    },
}
