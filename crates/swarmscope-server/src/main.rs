//! Service binary for Swarmscope.
//!
//! Wires a data source into the state synchronizer and serves the
//! published snapshot over HTTP until interrupted.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `swarmscope.yaml` and `SWARMSCOPE_*` overrides
//! 3. Build the configured data source
//! 4. Start the refresh loop
//! 5. Serve the query API until `Ctrl-C`
//! 6. Stop the refresh loop

mod error;

use std::sync::Arc;

use swarmscope_core::config::{ServiceConfig, SourceKind};
use swarmscope_core::source::{ReplayDataSource, SimulatedDataSource, SwarmSource};
use swarmscope_core::StateSynchronizer;
use swarmscope_observer::{AppState, ServerConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::LaunchError;

/// Environment variable selecting the log output format (`json` or text).
const LOG_FORMAT_ENV: &str = "SWARMSCOPE_LOG_FORMAT";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the refresh loop cannot start or the server
/// cannot bind.
#[tokio::main]
async fn main() -> Result<(), LaunchError> {
    // 1. Initialize structured logging.
    init_tracing();

    info!("swarmscope-server starting");

    // 2. Load configuration. Invalid entries are logged and defaulted.
    let config = ServiceConfig::load();
    info!(
        refresh_interval_ms = config.refresh_interval_ms,
        simulated_entities = config.simulated_entities,
        host = %config.host,
        port = config.port,
        "Configuration loaded"
    );

    // 3. Build the data source.
    let source = build_source(&config);
    let source_name = source.name();
    info!(source = source_name, "Data source ready");

    // 4. Start the refresh loop.
    let sync = StateSynchronizer::new(source);
    sync.start(config.refresh_interval()).await?;

    // 5. Serve until interrupted.
    let state = Arc::new(AppState::new(
        sync.reader(),
        config.refresh_interval(),
        source_name,
    ));
    let server_config = ServerConfig {
        host: config.host.clone(),
        port: config.port,
    };
    let served = swarmscope_observer::start_server(&server_config, state, shutdown_signal()).await;

    // 6. Stop the refresh loop whether or not serving succeeded.
    sync.stop().await;
    served?;

    info!("swarmscope-server exited cleanly");
    Ok(())
}

/// Install the global tracing subscriber.
///
/// Honors `RUST_LOG` (default `info`) and switches to JSON lines when
/// `SWARMSCOPE_LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Build the data source the configuration asks for.
///
/// A replay recording that cannot be loaded falls back to the simulator so
/// the service still comes up.
fn build_source(config: &ServiceConfig) -> SwarmSource {
    let simulator = || {
        SwarmSource::Simulated(
            SimulatedDataSource::new(config.simulated_entities)
                .with_drift(config.simulated_drift),
        )
    };

    match &config.source {
        SourceKind::Simulated => simulator(),
        SourceKind::Replay { path } => match ReplayDataSource::from_file(path) {
            Ok(replay) => {
                info!(
                    path = %path.display(),
                    frames = replay.frame_count(),
                    "Replay recording loaded"
                );
                SwarmSource::Replay(replay)
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Replay recording unusable, falling back to simulator"
                );
                simulator()
            }
        },
    }
}

/// Resolve when the process receives `Ctrl-C`.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C; serving until killed");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
