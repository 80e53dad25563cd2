//! HTTP and `WebSocket` front end for the Tempo Relay.
//!
//! This crate provides an Axum server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws`) where each socket is one observer
//!   session of the hub
//! - **Status endpoint** (`/status`) reporting peers, tempo and observer
//!   count as JSON
//! - **Landing page** (`GET /`) showing the same status as HTML
//!
//! # Architecture
//!
//! Route handlers hold only a [`HubHandle`](tempo_core::HubHandle). The
//! clock, the session set and the poll loop are owned by the hub task in
//! `tempo-core`; this crate only moves frames between sockets and that
//! task.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use startup::{RelayHandles, StartupError, spawn_relay};
pub use state::AppState;
