//! Shared type definitions for the Tempo Relay.
//!
//! This crate is the single source of truth for every message exchanged
//! between the relay and its observers. Types defined here flow
//! downstream to `TypeScript` via `ts-rs` for browser clients.
//!
//! # Modules
//!
//! - [`ids`] -- Session identifier
//! - [`enums`] -- Transport commands and announcements
//! - [`structs`] -- Clock samples, connect snapshot, status report
//! - [`events`] -- Tagged server events and client commands

pub mod enums;
pub mod events;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{TransportCommand, TransportState};
pub use events::{ClientCommand, ServerEvent};
pub use ids::SessionId;
pub use structs::{ClockSample, LinkStatus, StatusReport};
