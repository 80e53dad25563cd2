//! Relay startup: spawn the session hub and the HTTP server together.
//!
//! [`spawn_relay`] binds eagerly, so a port conflict is reported before
//! anything runs in the background. The returned [`RelayHandles`] own
//! both tasks; [`RelayHandles::shutdown`] stops them in order: the hub
//! first (closing every observer socket), then the listener.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tempo_core::{LocalClock, RelayConfig};
//! use tempo_server::startup::spawn_relay;
//!
//! let config = RelayConfig::default();
//! let clock = LocalClock::new(config.clock.initial_bpm, config.clock.quantum)?;
//! let relay = spawn_relay(&config, clock).await?;
//! tokio::signal::ctrl_c().await?;
//! relay.shutdown().await?;
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tempo_core::hub::{self, SessionHub};
use tempo_core::{ClockAdapter, HubHandle, RelayConfig};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::server::{self, ServerConfig, ServerError};
use crate::state::AppState;

/// Errors that can occur when starting or stopping the relay.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or serve.
    #[error("server error: {0}")]
    Server(#[from] ServerError),

    /// A background task panicked or was cancelled.
    #[error("task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Running relay tasks.
#[derive(Debug)]
pub struct RelayHandles {
    /// Sender side of the session hub.
    pub hub: HubHandle,
    /// Address the server is bound to.
    pub local_addr: SocketAddr,
    hub_task: JoinHandle<()>,
    server_task: JoinHandle<Result<(), ServerError>>,
    stop_server: oneshot::Sender<()>,
}

/// Start the session hub with `clock` and serve it on the configured
/// address.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the address cannot be bound. The
/// hub is not started in that case.
pub async fn spawn_relay<C>(config: &RelayConfig, clock: C) -> Result<RelayHandles, StartupError>
where
    C: ClockAdapter + 'static,
{
    let listener = server::bind(&ServerConfig::from(&config.server)).await?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("listener has no address: {e}")))?;

    let (hub, hub_task) = hub::spawn(SessionHub::new(clock, config.clock.poll_interval()));
    let state = Arc::new(AppState::new(hub.clone()));

    let (stop_server, stopped) = oneshot::channel::<()>();
    let shutdown = async move {
        // A dropped sender also stops the server.
        let _ = stopped.await;
    };
    let server_task = tokio::spawn(server::serve(listener, state, shutdown));

    info!(
        %local_addr,
        poll_interval_ms = config.clock.poll_interval_ms,
        "Tempo relay started"
    );

    Ok(RelayHandles {
        hub,
        local_addr,
        hub_task,
        server_task,
        stop_server,
    })
}

impl RelayHandles {
    /// Stop polling, close every observer, then stop the server and wait
    /// for both tasks.
    ///
    /// # Errors
    ///
    /// Returns the server's own error if it failed while serving, or
    /// [`StartupError::Join`] if a task panicked.
    pub async fn shutdown(self) -> Result<(), StartupError> {
        if self.hub.shutdown().await.is_err() {
            debug!("Hub already stopped");
        }
        self.hub_task.await?;

        // The server may have already exited on its own.
        let _ = self.stop_server.send(());
        self.server_task.await??;

        info!("Tempo relay shut down");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempo_core::LocalClock;

    use super::*;

    fn local_config() -> RelayConfig {
        let mut config = RelayConfig::default();
        config.server.host = "127.0.0.1".to_owned();
        config.server.port = 0;
        config
    }

    #[tokio::test]
    async fn spawn_and_shutdown() {
        let clock = LocalClock::new(120.0, 4.0).unwrap();
        let relay = spawn_relay(&local_config(), clock).await.unwrap();
        assert_ne!(relay.local_addr.port(), 0);

        let report = relay.hub.status().await.unwrap();
        assert_eq!(report.connected_clients, 0);

        let hub = relay.hub.clone();
        relay.shutdown().await.unwrap();
        assert!(hub.status().await.is_err());
    }

    #[tokio::test]
    async fn occupied_port_fails_before_spawning() {
        let clock = LocalClock::new(120.0, 4.0).unwrap();
        let first = spawn_relay(&local_config(), clock).await.unwrap();

        let mut config = local_config();
        config.server.port = first.local_addr.port();
        let clock = LocalClock::new(120.0, 4.0).unwrap();
        let second = spawn_relay(&config, clock).await;
        assert!(matches!(second, Err(StartupError::Server(ServerError::Bind(_)))));

        first.shutdown().await.unwrap();
    }
}
