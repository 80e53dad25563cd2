//! Clock sampling, change filtering, and session management for the
//! Tempo Relay.
//!
//! This crate owns everything between the shared tempo clock and the
//! observer sockets. The transport itself lives in `tempo-server`.
//!
//! # Modules
//!
//! - [`adapter`] -- [`ClockAdapter`] trait, the seam to the shared clock.
//! - [`local`] -- [`LocalClock`], a free-running solo clock.
//! - [`filter`] -- Change thresholds deciding which samples are broadcast.
//! - [`registry`] -- Observer reference counting and broadcast fan-out.
//! - [`broadcast`] -- The interval poll loop.
//! - [`control`] -- Validation and application of observer commands.
//! - [`hub`] -- [`SessionHub`] event dispatcher and its actor task.
//! - [`mirror`] -- [`ObserverSession`], the client-side clock cache.
//! - [`config`] -- Configuration loading from `tempo-relay.yaml`.
//!
//! [`ClockAdapter`]: adapter::ClockAdapter
//! [`LocalClock`]: local::LocalClock
//! [`SessionHub`]: hub::SessionHub
//! [`ObserverSession`]: mirror::ObserverSession

pub mod adapter;
pub mod broadcast;
pub mod config;
pub mod control;
pub mod filter;
pub mod hub;
pub mod local;
pub mod mirror;
pub mod registry;

pub use adapter::{AdapterError, ClockAdapter};
pub use config::{ConfigError, RelayConfig};
pub use hub::{Connection, HubError, HubHandle, SessionHub};
pub use local::LocalClock;
pub use mirror::{ObserverCallbacks, ObserverEvent, ObserverSession, StatusChange};
