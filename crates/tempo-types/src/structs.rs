//! Payload structs carried by relay events and the status endpoint.
//!
//! Field names follow the observer protocol (`camelCase` on the wire).

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// One reading of the shared tempo clock.
///
/// Produced by the clock adapter on every poll tick and carried verbatim
/// in `link-update` events. Samples are transient: each one replaces the
/// previous and none are stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct ClockSample {
    /// Beat position on the shared timeline.
    pub beat: f64,
    /// Position within the current bar, in beats (`0 <= phase < quantum`).
    pub phase: f64,
    /// Tempo in beats per minute.
    pub bpm: f64,
    /// Number of remote peers in the session.
    #[ts(type = "number")]
    pub num_peers: u64,
}

impl ClockSample {
    /// Whether every floating-point field is finite.
    pub const fn is_finite(&self) -> bool {
        self.beat.is_finite() && self.phase.is_finite() && self.bpm.is_finite()
    }
}

/// Full clock snapshot sent once to each observer as it connects
/// (`link-status`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct LinkStatus {
    /// Always `true` when sent by the relay.
    pub is_connected: bool,
    /// Number of remote peers in the session.
    #[ts(type = "number")]
    pub num_peers: u64,
    /// Tempo in beats per minute.
    pub bpm: f64,
    /// Beat position on the shared timeline.
    pub beat: f64,
    /// Position within the current bar.
    pub phase: f64,
}

impl LinkStatus {
    /// Build the connect-time snapshot from a clock sample.
    pub const fn connected(sample: &ClockSample) -> Self {
        Self {
            is_connected: true,
            num_peers: sample.num_peers,
            bpm: sample.bpm,
            beat: sample.beat,
            phase: sample.phase,
        }
    }
}

/// Body of `GET /status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Process status; `"running"` whenever the relay answers.
    pub status: String,
    /// Number of remote peers in the clock session.
    #[ts(type = "number")]
    pub num_peers: u64,
    /// Current tempo.
    pub bpm: f64,
    /// Number of observers currently connected.
    #[ts(type = "number")]
    pub connected_clients: u64,
}
