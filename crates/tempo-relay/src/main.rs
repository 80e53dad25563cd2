//! Tempo Relay binary.
//!
//! Loads configuration, starts the local tempo clock, and serves it to
//! observers over `WebSocket` until `Ctrl-C` or `SIGTERM`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `tempo-relay.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Create the local clock
//! 4. Spawn the session hub and bind the server
//! 5. Wait for a termination signal, then shut down in order

mod error;

use std::path::Path;

use tempo_core::{LocalClock, RelayConfig};
use tempo_server::spawn_relay;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::RelayError;

/// Config file looked up in the working directory.
const CONFIG_FILE: &str = "tempo-relay.yaml";

/// Application entry point for the relay.
///
/// # Errors
///
/// Returns an error if configuration, binding, or shutdown fails.
#[tokio::main]
async fn main() -> Result<(), RelayError> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging. RUST_LOG wins over the config.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        host = config.server.host,
        port = config.server.port,
        poll_interval_ms = config.clock.poll_interval_ms,
        initial_bpm = config.clock.initial_bpm,
        "Configuration loaded"
    );

    // 3. Create the clock.
    let clock = LocalClock::new(config.clock.initial_bpm, config.clock.quantum)?;

    // 4. Spawn hub and server.
    let relay = spawn_relay(&config, clock).await?;
    info!(addr = %relay.local_addr, "Tempo relay ready");

    // 5. Run until told to stop.
    shutdown_signal().await?;
    info!("Shutdown signal received");
    relay.shutdown().await?;

    Ok(())
}

/// Load `tempo-relay.yaml` if present, otherwise defaults. Environment
/// overrides apply either way.
fn load_config() -> Result<RelayConfig, RelayError> {
    let config_path = Path::new(CONFIG_FILE);
    if config_path.exists() {
        Ok(RelayConfig::from_file(config_path)?)
    } else {
        Ok(RelayConfig::parse("")?)
    }
}

/// Resolve on `Ctrl-C`, or on `SIGTERM` where available.
async fn shutdown_signal() -> Result<(), RelayError> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}
