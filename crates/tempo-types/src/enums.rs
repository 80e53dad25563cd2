//! Transport enumerations.
//!
//! The relay never tracks whether transport is running. A
//! [`TransportCommand`] from one observer is answered with a
//! [`TransportState`] announcement to every observer, and that is all.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Transport request issued by an observer (`"start"` / `"stop"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum TransportCommand {
    /// Ask every observer to start playback.
    Start,
    /// Ask every observer to stop playback.
    Stop,
}

/// Transport announcement broadcast to observers (`"started"` / `"stopped"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    /// An observer requested start.
    Started,
    /// An observer requested stop.
    Stopped,
}

impl From<TransportCommand> for TransportState {
    fn from(command: TransportCommand) -> Self {
        match command {
            TransportCommand::Start => Self::Started,
            TransportCommand::Stop => Self::Stopped,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn transport_strings_match_wire_protocol() {
        assert_eq!(serde_json::to_string(&TransportCommand::Start).unwrap(), r#""start""#);
        assert_eq!(serde_json::to_string(&TransportState::Stopped).unwrap(), r#""stopped""#);
    }

    #[test]
    fn unknown_transport_command_is_rejected() {
        let parsed: Result<TransportCommand, _> = serde_json::from_str(r#""pause""#);
        assert!(parsed.is_err());
    }

    #[test]
    fn command_maps_to_announcement() {
        assert_eq!(TransportState::from(TransportCommand::Start), TransportState::Started);
        assert_eq!(TransportState::from(TransportCommand::Stop), TransportState::Stopped);
    }
}
