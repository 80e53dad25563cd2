//! Shared application state for the relay's HTTP and `WebSocket` routes.
//!
//! Handlers never touch the clock or the session set directly. Everything
//! goes through the [`HubHandle`], so the hub task stays the single owner.

use chrono::{DateTime, Utc};
use tempo_core::HubHandle;

/// State shared by every route.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Sender side of the running session hub.
    pub hub: HubHandle,
    /// When the server was started.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Wrap a running hub.
    pub fn new(hub: HubHandle) -> Self {
        Self {
            hub,
            started_at: Utc::now(),
        }
    }
}
