//! Observer protocol messages.
//!
//! Every frame on the observer channel is a JSON object of the form
//! `{"event": <name>, "data": <payload>}`:
//!
//! | Direction | Event | Payload |
//! |-----------|-------|---------|
//! | server -> client | `link-status` | [`LinkStatus`] |
//! | server -> client | `link-update` | [`ClockSample`] |
//! | server -> client | `bpm-changed` | number |
//! | server -> client | `transport-state` | [`TransportState`] |
//! | client -> server | `set-bpm` | number |
//! | client -> server | `set-beat` | number |
//! | client -> server | `transport` | [`TransportCommand`] |

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{TransportCommand, TransportState};
use crate::structs::{ClockSample, LinkStatus};

/// Event pushed from the relay to observers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Full snapshot, sent once on connect.
    LinkStatus(LinkStatus),
    /// Periodic filtered clock reading.
    LinkUpdate(ClockSample),
    /// Tempo changed by an observer command.
    BpmChanged(f64),
    /// Transport announcement.
    TransportState(TransportState),
}

impl ServerEvent {
    /// Wire name of the event.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::LinkStatus(_) => "link-status",
            Self::LinkUpdate(_) => "link-update",
            Self::BpmChanged(_) => "bpm-changed",
            Self::TransportState(_) => "transport-state",
        }
    }
}

/// Control command sent from an observer to the relay.
///
/// Frames with an unknown event name or a payload of the wrong type fail
/// to decode and are dropped by the receiver; range checks happen later,
/// in the control router.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientCommand {
    /// Request a tempo change.
    SetBpm(f64),
    /// Request a beat position change.
    SetBeat(f64),
    /// Request a transport announcement.
    Transport(TransportCommand),
}

impl ClientCommand {
    /// Decode a command from a text frame.
    ///
    /// # Errors
    ///
    /// Returns the JSON error for malformed frames, unknown events, or
    /// payloads of the wrong type.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
