//! Client-side mirror of the relay's clock.
//!
//! [`ObserverSession`] is what an observer process keeps locally: the last
//! known clock values plus a sink for outgoing commands. It is fed
//! [`ObserverEvent`]s by whatever transport the client uses and reports
//! changes through [`ObserverCallbacks`]. It does not open connections
//! itself, so it can be driven entirely in memory.
//!
//! Commands issued while disconnected are dropped. Diagnostic logging is
//! off unless the session was built with [`ObserverSession::with_debug`].

use tempo_types::{
    ClientCommand, ClockSample, LinkStatus, ServerEvent, TransportCommand, TransportState,
};
use tokio::sync::mpsc;
use tracing::debug;

use crate::adapter::DEFAULT_BPM;
use crate::config::ClientConfig;

/// A connection-level change reported to [`ObserverCallbacks::on_status_change`].
#[derive(Debug, Clone, PartialEq)]
pub enum StatusChange {
    /// The channel to the relay opened.
    Connected,
    /// The channel to the relay closed.
    Disconnected,
    /// Connecting failed.
    ConnectError(String),
    /// The relay sent a full `link-status` snapshot.
    Snapshot(LinkStatus),
}

impl StatusChange {
    /// Whether the observer is connected after this change.
    pub const fn is_connected(&self) -> bool {
        match self {
            Self::Connected => true,
            Self::Disconnected | Self::ConnectError(_) => false,
            Self::Snapshot(status) => status.is_connected,
        }
    }
}

/// Input to an [`ObserverSession`].
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverEvent {
    /// Transport connected.
    Connect,
    /// Transport disconnected.
    Disconnect,
    /// Transport failed to connect.
    ConnectError(String),
    /// A decoded server frame.
    Server(ServerEvent),
}

/// Notification hooks. Every method defaults to a no-op.
pub trait ObserverCallbacks {
    /// A `link-update` arrived.
    fn on_update(&mut self, _sample: &ClockSample) {}

    /// Connection state changed or a snapshot arrived.
    fn on_status_change(&mut self, _change: &StatusChange) {}

    /// The relay announced a transport state.
    fn on_transport_change(&mut self, _state: TransportState) {}
}

impl ObserverCallbacks for () {}

/// Local cache of the relay's clock state.
#[derive(Debug)]
pub struct ObserverSession<B> {
    server_url: String,
    callbacks: B,
    outbound: Option<mpsc::Sender<ClientCommand>>,
    is_connected: bool,
    num_peers: u64,
    bpm: f64,
    beat: f64,
    phase: f64,
    debug: bool,
}

impl<B: ObserverCallbacks> ObserverSession<B> {
    /// Create a disconnected mirror for the relay at `server_url`.
    pub fn new(server_url: impl Into<String>, callbacks: B) -> Self {
        Self {
            server_url: server_url.into(),
            callbacks,
            outbound: None,
            is_connected: false,
            num_peers: 0,
            bpm: DEFAULT_BPM,
            beat: 0.0,
            phase: 0.0,
            debug: false,
        }
    }

    /// Create a disconnected mirror for the relay named in `config`.
    pub fn from_config(config: &ClientConfig, callbacks: B) -> Self {
        Self::new(config.server_url.clone(), callbacks)
    }

    /// Enable diagnostic logging at `debug`.
    #[must_use]
    pub const fn with_debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Attach the sink that outgoing commands are written to.
    pub fn attach(&mut self, sink: mpsc::Sender<ClientCommand>) {
        self.outbound = Some(sink);
    }

    /// Drop the outgoing sink and mark the mirror disconnected.
    pub fn disconnect(&mut self) {
        self.outbound = None;
        if self.is_connected {
            self.apply(ObserverEvent::Disconnect);
        }
    }

    /// Feed one event into the mirror.
    pub fn apply(&mut self, event: ObserverEvent) {
        if self.debug {
            debug!(url = %self.server_url, event = ?event, "Observer event");
        }
        match event {
            ObserverEvent::Connect => {
                self.is_connected = true;
                self.callbacks.on_status_change(&StatusChange::Connected);
            }
            ObserverEvent::Disconnect => {
                self.is_connected = false;
                self.callbacks.on_status_change(&StatusChange::Disconnected);
            }
            // A failed attempt says nothing about an existing channel, so
            // the connection flag is left as is.
            ObserverEvent::ConnectError(error) => {
                self.callbacks
                    .on_status_change(&StatusChange::ConnectError(error));
            }
            ObserverEvent::Server(event) => self.apply_server(event),
        }
    }

    fn apply_server(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::LinkStatus(status) => {
                self.is_connected = status.is_connected;
                self.num_peers = status.num_peers;
                self.bpm = status.bpm;
                self.beat = status.beat;
                self.phase = status.phase;
                self.callbacks
                    .on_status_change(&StatusChange::Snapshot(status));
            }
            ServerEvent::LinkUpdate(sample) => {
                self.beat = sample.beat;
                self.phase = sample.phase;
                self.bpm = sample.bpm;
                self.num_peers = sample.num_peers;
                self.callbacks.on_update(&sample);
            }
            ServerEvent::BpmChanged(bpm) => {
                self.bpm = bpm;
                if self.debug {
                    debug!(bpm, "Relay tempo changed");
                }
            }
            ServerEvent::TransportState(state) => self.callbacks.on_transport_change(state),
        }
    }

    /// Ask the relay to change tempo.
    pub fn set_bpm(&self, bpm: f64) {
        self.send(ClientCommand::SetBpm(bpm));
    }

    /// Ask the relay to move the beat position.
    pub fn set_beat(&self, beat: f64) {
        self.send(ClientCommand::SetBeat(beat));
    }

    /// Announce transport start.
    pub fn start(&self) {
        self.send(ClientCommand::Transport(TransportCommand::Start));
    }

    /// Announce transport stop.
    pub fn stop(&self) {
        self.send(ClientCommand::Transport(TransportCommand::Stop));
    }

    fn send(&self, command: ClientCommand) {
        let Some(sink) = self.outbound.as_ref().filter(|_| self.is_connected) else {
            if self.debug {
                debug!(command = ?command, "Not connected, command dropped");
            }
            return;
        };
        if let Err(e) = sink.try_send(command) {
            if self.debug {
                debug!(error = %e, "Command sink unavailable, command dropped");
            }
        }
    }

    /// Relay address this mirror belongs to.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Whether the channel to the relay is open.
    pub const fn is_connected(&self) -> bool {
        self.is_connected
    }

    /// Last known peer count.
    pub const fn num_peers(&self) -> u64 {
        self.num_peers
    }

    /// Last known tempo.
    pub const fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Last known beat.
    pub const fn beat(&self) -> f64 {
        self.beat
    }

    /// Last known phase.
    pub const fn phase(&self) -> f64 {
        self.phase
    }

    /// The callback receiver.
    pub const fn callbacks(&self) -> &B {
        &self.callbacks
    }
}
