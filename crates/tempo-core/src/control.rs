//! Observer control commands.
//!
//! Commands are fire-and-forget. A valid command mutates the clock and
//! may produce one event for broadcast; an invalid one is dropped with a
//! debug log and nothing goes back to the issuer.
//!
//! | Command | Accepted when | Clock effect | Broadcast |
//! |---------|---------------|--------------|-----------|
//! | `set-bpm` | finite and `> 0` | tempo set | `bpm-changed` |
//! | `set-beat` | finite and `>= 0` | beat set | none, next tick carries it |
//! | `transport` | `start` / `stop` | none | `transport-state` |

use tempo_types::{ClientCommand, ServerEvent, SessionId, TransportCommand, TransportState};
use tracing::{debug, info};

use crate::adapter::ClockAdapter;

/// Whether `bpm` is an acceptable tempo.
pub const fn is_valid_bpm(bpm: f64) -> bool {
    bpm.is_finite() && bpm > 0.0
}

/// Whether `beat` is an acceptable beat position.
pub const fn is_valid_beat(beat: f64) -> bool {
    beat.is_finite() && beat >= 0.0
}

/// Apply a command from `session` to the clock.
///
/// Returns the event to broadcast to every observer, if any.
pub fn apply<C>(clock: &mut C, session: SessionId, command: ClientCommand) -> Option<ServerEvent>
where
    C: ClockAdapter + ?Sized,
{
    match command {
        ClientCommand::SetBpm(bpm) => set_bpm(clock, session, bpm),
        ClientCommand::SetBeat(beat) => {
            set_beat(clock, session, beat);
            None
        }
        ClientCommand::Transport(command) => Some(transport(session, command)),
    }
}

/// Set the tempo. Returns the `bpm-changed` event when accepted.
pub fn set_bpm<C>(clock: &mut C, session: SessionId, bpm: f64) -> Option<ServerEvent>
where
    C: ClockAdapter + ?Sized,
{
    if !is_valid_bpm(bpm) {
        debug!(session = %session, bpm, "Ignoring invalid set-bpm");
        return None;
    }
    clock.set_bpm(bpm);
    info!(session = %session, bpm, "BPM set");
    Some(ServerEvent::BpmChanged(bpm))
}

/// Set the beat position. Returns whether the command was accepted.
pub fn set_beat<C>(clock: &mut C, session: SessionId, beat: f64) -> bool
where
    C: ClockAdapter + ?Sized,
{
    if !is_valid_beat(beat) {
        debug!(session = %session, beat, "Ignoring invalid set-beat");
        return false;
    }
    clock.set_beat(beat);
    info!(session = %session, beat, "Beat set");
    true
}

/// Turn a transport request into the announcement for all observers.
/// The clock itself keeps running either way.
pub fn transport(session: SessionId, command: TransportCommand) -> ServerEvent {
    let state = TransportState::from(command);
    info!(session = %session, state = ?state, "Transport announced");
    ServerEvent::TransportState(state)
}
