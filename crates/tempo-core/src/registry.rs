//! Observer session tracking and broadcast fan-out.
//!
//! The registry reference-counts connected observers. The count alone
//! decides the poll loop lifecycle: the first observer starts it, the
//! last one to leave stops it. [`transition`] is that rule as a pure
//! function; [`SessionRegistry`] applies it while keeping one outbox per
//! observer.
//!
//! # Fan-out
//!
//! Every broadcast walks all outboxes in one pass, so all observers see
//! events in the same relative order, the issuer of a command included.
//! Outboxes are bounded: an observer that stops draining loses events
//! rather than stalling the hub for everyone else.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tempo_types::{ServerEvent, SessionId};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

/// A change in the number of connected observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryEvent {
    /// An observer channel opened.
    Connected,
    /// An observer channel closed.
    Disconnected,
}

/// What the poll loop must do after a count transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEffect {
    /// The count went 0 -> 1.
    Start,
    /// The count went 1 -> 0.
    Stop,
    /// Any other transition.
    Unchanged,
}

/// Apply one event to the observer count.
///
/// A disconnect at zero is absorbed: the count stays at zero and the loop
/// is left alone.
pub const fn transition(count: u64, event: RegistryEvent) -> (u64, LoopEffect) {
    match event {
        RegistryEvent::Connected => {
            let next = count.saturating_add(1);
            let effect = if next == 1 {
                LoopEffect::Start
            } else {
                LoopEffect::Unchanged
            };
            (next, effect)
        }
        RegistryEvent::Disconnected => {
            if count == 0 {
                return (0, LoopEffect::Unchanged);
            }
            let next = count.saturating_sub(1);
            let effect = if next == 0 {
                LoopEffect::Stop
            } else {
                LoopEffect::Unchanged
            };
            (next, effect)
        }
    }
}

#[derive(Debug)]
struct SessionEntry {
    outbox: mpsc::Sender<ServerEvent>,
    connected_at: DateTime<Utc>,
}

/// The set of connected observers.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<SessionId, SessionEntry>,
    count: u64,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            sessions: BTreeMap::new(),
            count: 0,
        }
    }

    /// Register an observer's outbox.
    ///
    /// Registering an id that is already present replaces its outbox
    /// without changing the count.
    pub fn register(&mut self, id: SessionId, outbox: mpsc::Sender<ServerEvent>) -> LoopEffect {
        let entry = SessionEntry {
            outbox,
            connected_at: Utc::now(),
        };
        if self.sessions.insert(id, entry).is_some() {
            return LoopEffect::Unchanged;
        }
        let (count, effect) = transition(self.count, RegistryEvent::Connected);
        self.count = count;
        effect
    }

    /// Remove an observer. Unknown ids are ignored, so a disconnect
    /// delivered twice is harmless.
    pub fn unregister(&mut self, id: SessionId) -> LoopEffect {
        let Some(entry) = self.sessions.remove(&id) else {
            debug!(session = %id, "Disconnect for unknown session ignored");
            return LoopEffect::Unchanged;
        };
        let connected_for = Utc::now().signed_duration_since(entry.connected_at);
        debug!(
            session = %id,
            connected_ms = connected_for.num_milliseconds(),
            "Session removed"
        );
        let (count, effect) = transition(self.count, RegistryEvent::Disconnected);
        self.count = count;
        effect
    }

    /// Number of connected observers.
    pub const fn len(&self) -> u64 {
        self.count
    }

    /// Whether no observer is connected.
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Send an event to a single observer.
    ///
    /// Returns `false` if the session is unknown or its outbox is full or
    /// closed.
    pub fn send_to(&self, id: SessionId, event: ServerEvent) -> bool {
        self.sessions
            .get(&id)
            .is_some_and(|entry| deliver(id, &entry.outbox, event))
    }

    /// Send an event to every observer.
    ///
    /// Returns the number of outboxes that accepted it.
    pub fn broadcast(&self, event: ServerEvent) -> usize {
        self.sessions
            .iter()
            .filter(|(id, entry)| deliver(**id, &entry.outbox, event))
            .count()
    }

    /// Drop every session at once (shutdown).
    pub fn clear(&mut self) {
        self.sessions.clear();
        self.count = 0;
    }
}

fn deliver(id: SessionId, outbox: &mpsc::Sender<ServerEvent>, event: ServerEvent) -> bool {
    match outbox.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            debug!(session = %id, event = event.name(), "Outbox full, event dropped");
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!(session = %id, event = event.name(), "Outbox closed, event dropped");
            false
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn outbox() -> (mpsc::Sender<ServerEvent>, mpsc::Receiver<ServerEvent>) {
        mpsc::channel(4)
    }

    #[test]
    fn first_connect_starts_loop() {
        assert_eq!(transition(0, RegistryEvent::Connected), (1, LoopEffect::Start));
    }

    #[test]
    fn later_connects_are_loop_noops() {
        assert_eq!(transition(1, RegistryEvent::Connected), (2, LoopEffect::Unchanged));
        assert_eq!(transition(7, RegistryEvent::Connected), (8, LoopEffect::Unchanged));
    }

    #[test]
    fn last_disconnect_stops_loop() {
        assert_eq!(transition(1, RegistryEvent::Disconnected), (0, LoopEffect::Stop));
        assert_eq!(transition(3, RegistryEvent::Disconnected), (2, LoopEffect::Unchanged));
    }

    #[test]
    fn disconnect_at_zero_is_absorbed() {
        assert_eq!(transition(0, RegistryEvent::Disconnected), (0, LoopEffect::Unchanged));
    }

    #[test]
    fn register_and_unregister_track_count() {
        let mut registry = SessionRegistry::new();
        let (a_tx, _a_rx) = outbox();
        let (b_tx, _b_rx) = outbox();
        let a = SessionId::new();
        let b = SessionId::new();

        assert_eq!(registry.register(a, a_tx), LoopEffect::Start);
        assert_eq!(registry.register(b, b_tx), LoopEffect::Unchanged);
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.unregister(a), LoopEffect::Unchanged);
        assert_eq!(registry.unregister(b), LoopEffect::Stop);
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_disconnect_is_noop() {
        let mut registry = SessionRegistry::new();
        let (tx, _rx) = outbox();
        let id = SessionId::new();
        registry.register(id, tx);
        assert_eq!(registry.unregister(id), LoopEffect::Stop);
        assert_eq!(registry.unregister(id), LoopEffect::Unchanged);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn unknown_disconnect_does_not_touch_others() {
        let mut registry = SessionRegistry::new();
        let (tx, _rx) = outbox();
        registry.register(SessionId::new(), tx);
        assert_eq!(registry.unregister(SessionId::new()), LoopEffect::Unchanged);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn reregistering_same_id_keeps_count() {
        let mut registry = SessionRegistry::new();
        let id = SessionId::new();
        let (first, _first_rx) = outbox();
        let (second, _second_rx) = outbox();
        registry.register(id, first);
        assert_eq!(registry.register(id, second), LoopEffect::Unchanged);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn broadcast_reaches_every_session() {
        let mut registry = SessionRegistry::new();
        let (a_tx, mut a_rx) = outbox();
        let (b_tx, mut b_rx) = outbox();
        registry.register(SessionId::new(), a_tx);
        registry.register(SessionId::new(), b_tx);

        assert_eq!(registry.broadcast(ServerEvent::BpmChanged(100.0)), 2);
        assert_eq!(a_rx.try_recv().unwrap(), ServerEvent::BpmChanged(100.0));
        assert_eq!(b_rx.try_recv().unwrap(), ServerEvent::BpmChanged(100.0));
    }

    #[test]
    fn send_to_targets_one_session() {
        let mut registry = SessionRegistry::new();
        let (a_tx, mut a_rx) = outbox();
        let (b_tx, mut b_rx) = outbox();
        let a = SessionId::new();
        registry.register(a, a_tx);
        registry.register(SessionId::new(), b_tx);

        assert!(registry.send_to(a, ServerEvent::BpmChanged(90.0)));
        assert!(a_rx.try_recv().is_ok());
        assert!(b_rx.try_recv().is_err());
        assert!(!registry.send_to(SessionId::new(), ServerEvent::BpmChanged(90.0)));
    }

    #[test]
    fn full_outbox_drops_only_for_that_session() {
        let mut registry = SessionRegistry::new();
        let (slow_tx, _slow_rx) = mpsc::channel(1);
        let (fast_tx, mut fast_rx) = mpsc::channel(8);
        registry.register(SessionId::new(), slow_tx);
        registry.register(SessionId::new(), fast_tx);

        assert_eq!(registry.broadcast(ServerEvent::BpmChanged(1.0)), 2);
        assert_eq!(registry.broadcast(ServerEvent::BpmChanged(2.0)), 1);
        assert_eq!(fast_rx.try_recv().unwrap(), ServerEvent::BpmChanged(1.0));
        assert_eq!(fast_rx.try_recv().unwrap(), ServerEvent::BpmChanged(2.0));
    }

    #[test]
    fn closed_outbox_is_skipped() {
        let mut registry = SessionRegistry::new();
        let (tx, rx) = outbox();
        registry.register(SessionId::new(), tx);
        drop(rx);
        assert_eq!(registry.broadcast(ServerEvent::BpmChanged(1.0)), 0);
        // The session stays registered until its disconnect arrives.
        assert_eq!(registry.len(), 1);
    }
}
