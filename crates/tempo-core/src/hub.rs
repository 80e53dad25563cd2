//! The session hub: one owner for the clock, the registry and the poll
//! loop.
//!
//! Every input to the relay is a [`HubEvent`]: observer connects and
//! disconnects, control commands, timer ticks, status queries. The hub
//! handles them strictly one at a time, and no handler awaits, so a
//! registry count change and the poll loop start/stop it triggers always
//! happen together. Nothing else touches the clock.
//!
//! [`SessionHub::handle`] is the whole state machine and is driven
//! directly in tests. In the server it runs inside [`run`] on its own
//! task, and connection handlers reach it through a [`HubHandle`].
//!
//! # Architecture
//!
//! ```text
//! ws task ──HubEvent──▶ inbox ──▶ run() ──▶ SessionHub::handle
//!                                  ▲            │
//!                     interval tick┘            ├─▶ control::apply ─▶ clock
//!                                               └─▶ registry.broadcast ─▶ outboxes
//! ```

use std::ops::ControlFlow;
use std::time::Duration;

use tempo_types::{
    ClientCommand, ClockSample, LinkStatus, ServerEvent, SessionId, StatusReport,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::adapter::ClockAdapter;
use crate::broadcast::{BroadcastLoop, LoopState};
use crate::control;
use crate::registry::{LoopEffect, SessionRegistry};

/// Capacity of each observer's outbox.
///
/// If an observer falls behind by more than this many events, further
/// events for it are dropped until it catches up.
pub const OUTBOX_CAPACITY: usize = 256;

/// Capacity of the hub's inbound event queue.
pub const INBOX_CAPACITY: usize = 1024;

/// Errors returned to callers of a [`HubHandle`].
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The hub task has exited.
    #[error("session hub is not running")]
    Closed,
}

/// A newly registered observer.
#[derive(Debug)]
pub struct Connection {
    /// Id assigned by the hub.
    pub session: SessionId,
    /// Events for this observer, starting with its `link-status`.
    pub events: mpsc::Receiver<ServerEvent>,
}

/// Inbound hub event.
#[derive(Debug)]
pub enum HubEvent {
    /// An observer channel opened.
    Connect {
        /// Receives the new session.
        reply: oneshot::Sender<Connection>,
    },
    /// An observer channel closed.
    Disconnect {
        /// Session that closed.
        session: SessionId,
    },
    /// A control command from an observer.
    Command {
        /// Issuing session.
        session: SessionId,
        /// Decoded command.
        command: ClientCommand,
    },
    /// The poll interval elapsed.
    Tick,
    /// Status query.
    Status {
        /// Receives the report.
        reply: oneshot::Sender<StatusReport>,
    },
    /// Stop polling, drop every session and exit.
    Shutdown,
}

/// Owner of the authoritative clock and all observer sessions.
#[derive(Debug)]
pub struct SessionHub<C> {
    clock: C,
    registry: SessionRegistry,
    poller: BroadcastLoop,
    outbox_capacity: usize,
}

impl<C: ClockAdapter> SessionHub<C> {
    /// Create a hub with no observers and the poll loop idle.
    pub fn new(clock: C, poll_interval: Duration) -> Self {
        Self {
            clock,
            registry: SessionRegistry::new(),
            poller: BroadcastLoop::new(poll_interval),
            outbox_capacity: OUTBOX_CAPACITY,
        }
    }

    /// Override the per-observer outbox capacity (minimum 1).
    #[must_use]
    pub fn with_outbox_capacity(mut self, capacity: usize) -> Self {
        self.outbox_capacity = capacity.max(1);
        self
    }

    /// Process one event. Returns `Break` after [`HubEvent::Shutdown`].
    pub fn handle(&mut self, event: HubEvent) -> ControlFlow<()> {
        match event {
            HubEvent::Connect { reply } => {
                let connection = self.connect();
                if let Err(abandoned) = reply.send(connection) {
                    debug!(session = %abandoned.session, "Connect abandoned by caller");
                    self.disconnect(abandoned.session);
                }
            }
            HubEvent::Disconnect { session } => self.disconnect(session),
            HubEvent::Command { session, command } => self.command(session, command),
            HubEvent::Tick => self.tick(),
            HubEvent::Status { reply } => {
                // The asker may have given up; nothing to undo.
                let _ = reply.send(self.status());
            }
            HubEvent::Shutdown => {
                self.shutdown();
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Register a new observer and queue its `link-status` snapshot.
    ///
    /// The first observer starts the poll loop. The snapshot is sent
    /// regardless of the change filter and before any other event.
    pub fn connect(&mut self) -> Connection {
        let session = SessionId::new();
        let (outbox, events) = mpsc::channel(self.outbox_capacity);

        if self.registry.register(session, outbox) == LoopEffect::Start {
            self.clock.enable();
            self.poller.start();
        }
        info!(
            session = %session,
            connected_clients = self.registry.len(),
            "Observer connected"
        );

        let status = LinkStatus::connected(&self.snapshot());
        self.registry.send_to(session, ServerEvent::LinkStatus(status));

        Connection { session, events }
    }

    /// Remove an observer. The last one out stops the poll loop. Unknown
    /// sessions are ignored.
    pub fn disconnect(&mut self, session: SessionId) {
        let known = self.registry.contains(session);
        if self.registry.unregister(session) == LoopEffect::Stop {
            self.poller.stop();
        }
        if known {
            info!(
                session = %session,
                connected_clients = self.registry.len(),
                "Observer disconnected"
            );
        }
    }

    /// Apply a control command and broadcast its result, if any.
    pub fn command(&mut self, session: SessionId, command: ClientCommand) {
        if !self.registry.contains(session) {
            debug!(session = %session, "Command from unknown session dropped");
            return;
        }
        if let Some(event) = control::apply(&mut self.clock, session, command) {
            self.registry.broadcast(event);
        }
    }

    /// Run one poll tick and broadcast the sample if it passes the filter.
    pub fn tick(&mut self) {
        if let Some(sample) = self.poller.tick(&self.clock) {
            let delivered = self.registry.broadcast(ServerEvent::LinkUpdate(sample));
            trace!(delivered, beat = sample.beat, "Link update broadcast");
        }
    }

    /// Current status for `GET /status`.
    pub fn status(&self) -> StatusReport {
        StatusReport {
            status: "running".to_owned(),
            num_peers: self.clock.num_peers(),
            bpm: self.clock.bpm(),
            connected_clients: self.registry.len(),
        }
    }

    /// Stop polling and drop every session.
    pub fn shutdown(&mut self) {
        self.poller.stop();
        let dropped = self.registry.len();
        self.registry.clear();
        info!(dropped_sessions = dropped, "Session hub shut down");
    }

    /// Wait for the poll loop's next tick. Never resolves while idle.
    pub async fn next_tick(&mut self) {
        self.poller.next_tick().await;
    }

    /// Number of connected observers.
    pub const fn session_count(&self) -> u64 {
        self.registry.len()
    }

    /// Whether the poll loop is running.
    pub const fn is_polling(&self) -> bool {
        self.poller.is_polling()
    }

    /// Poll loop state.
    pub const fn loop_state(&self) -> LoopState {
        self.poller.state()
    }

    /// The authoritative clock.
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    fn snapshot(&self) -> ClockSample {
        self.clock
            .sample()
            .ok()
            .filter(ClockSample::is_finite)
            .unwrap_or_else(|| {
                warn!("Clock unreadable on connect, sending last broadcast state");
                let last = self.poller.last_broadcast();
                ClockSample {
                    beat: last.beat,
                    phase: last.phase,
                    bpm: self.clock.bpm(),
                    num_peers: self.clock.num_peers(),
                }
            })
    }
}

/// Drive a hub from its inbox and its poll timer until shutdown or until
/// every [`HubHandle`] is dropped.
pub async fn run<C: ClockAdapter>(mut hub: SessionHub<C>, mut inbox: mpsc::Receiver<HubEvent>) {
    info!("Session hub running");
    loop {
        let event = tokio::select! {
            received = inbox.recv() => received.unwrap_or_else(|| {
                debug!("All hub handles dropped");
                HubEvent::Shutdown
            }),
            () = hub.next_tick() => HubEvent::Tick,
        };
        if hub.handle(event).is_break() {
            break;
        }
    }
}

/// Spawn [`run`] on a background Tokio task.
pub fn spawn<C>(hub: SessionHub<C>) -> (HubHandle, JoinHandle<()>)
where
    C: ClockAdapter + 'static,
{
    let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
    let task = tokio::spawn(run(hub, rx));
    (HubHandle { tx }, task)
}

/// Cloneable sender side of a running hub.
#[derive(Debug, Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubEvent>,
}

impl HubHandle {
    /// Register a new observer.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has exited.
    pub async fn connect(&self) -> Result<Connection, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubEvent::Connect { reply }).await?;
        rx.await.map_err(|_err| HubError::Closed)
    }

    /// Remove an observer.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has exited.
    pub async fn disconnect(&self, session: SessionId) -> Result<(), HubError> {
        self.send(HubEvent::Disconnect { session }).await
    }

    /// Forward a control command.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has exited.
    pub async fn command(&self, session: SessionId, command: ClientCommand) -> Result<(), HubError> {
        self.send(HubEvent::Command { session, command }).await
    }

    /// Query the status report.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has exited.
    pub async fn status(&self) -> Result<StatusReport, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubEvent::Status { reply }).await?;
        rx.await.map_err(|_err| HubError::Closed)
    }

    /// Ask the hub to stop polling and exit.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Closed`] if the hub has already exited.
    pub async fn shutdown(&self) -> Result<(), HubError> {
        self.send(HubEvent::Shutdown).await
    }

    async fn send(&self, event: HubEvent) -> Result<(), HubError> {
        self.tx.send(event).await.map_err(|_err| HubError::Closed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tempo_types::{TransportCommand, TransportState};
    use tokio::sync::mpsc::error::TryRecvError;

    use super::*;
    use crate::adapter::AdapterError;

    const PERIOD: Duration = Duration::from_millis(50);

    /// Clock whose state the test can read and change while the hub owns it.
    #[derive(Clone)]
    struct SharedClock(Arc<Mutex<ClockSample>>);

    impl SharedClock {
        fn new() -> Self {
            Self(Arc::new(Mutex::new(ClockSample {
                beat: 0.0,
                phase: 0.0,
                bpm: 120.0,
                num_peers: 0,
            })))
        }

        fn update(&self, f: impl FnOnce(&mut ClockSample)) {
            f(&mut self.0.lock().unwrap());
        }

        fn get(&self) -> ClockSample {
            *self.0.lock().unwrap()
        }
    }

    impl ClockAdapter for SharedClock {
        fn sample(&self) -> Result<ClockSample, AdapterError> {
            Ok(self.get())
        }
        fn num_peers(&self) -> u64 {
            self.get().num_peers
        }
        fn bpm(&self) -> f64 {
            self.get().bpm
        }
        fn set_bpm(&mut self, bpm: f64) {
            self.update(|s| s.bpm = bpm);
        }
        fn set_beat(&mut self, beat: f64) {
            self.update(|s| s.beat = beat);
        }
    }

    fn hub() -> (SessionHub<SharedClock>, SharedClock) {
        let clock = SharedClock::new();
        (SessionHub::new(clock.clone(), PERIOD), clock)
    }

    fn drain(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn first_connect_gets_snapshot_before_any_tick() {
        let (mut hub, clock) = hub();
        clock.update(|s| {
            s.beat = 7.25;
            s.phase = 3.25;
            s.bpm = 133.0;
            s.num_peers = 2;
        });

        let mut conn = hub.connect();
        let events = drain(&mut conn.events);
        assert_eq!(
            events,
            vec![ServerEvent::LinkStatus(LinkStatus {
                is_connected: true,
                num_peers: 2,
                bpm: 133.0,
                beat: 7.25,
                phase: 3.25,
            })]
        );
        assert!(hub.is_polling());
    }

    #[tokio::test]
    async fn polling_iff_sessions_connected() {
        let (mut hub, _clock) = hub();
        let mut open = Vec::new();
        let check = |hub: &SessionHub<SharedClock>| {
            assert_eq!(hub.is_polling(), hub.session_count() > 0);
        };

        check(&hub);
        for _ in 0..3 {
            open.push(hub.connect());
            check(&hub);
        }
        let first = open.remove(0);
        hub.disconnect(first.session);
        check(&hub);
        hub.disconnect(first.session);
        check(&hub);
        hub.disconnect(SessionId::new());
        check(&hub);
        for conn in open.drain(..) {
            hub.disconnect(conn.session);
            check(&hub);
        }
        assert_eq!(hub.loop_state(), LoopState::Idle);
        open.push(hub.connect());
        check(&hub);
    }

    #[tokio::test]
    async fn tick_broadcasts_to_all_sessions() {
        let (mut hub, clock) = hub();
        let mut a = hub.connect();
        let mut b = hub.connect();
        drain(&mut a.events);
        drain(&mut b.events);

        clock.update(|s| s.beat = 1.0);
        hub.tick();

        let expected = ServerEvent::LinkUpdate(clock.get());
        assert_eq!(drain(&mut a.events), vec![expected]);
        assert_eq!(drain(&mut b.events), vec![expected]);
    }

    #[tokio::test]
    async fn unchanged_solo_clock_is_not_rebroadcast() {
        let (mut hub, clock) = hub();
        let mut a = hub.connect();
        drain(&mut a.events);

        clock.update(|s| s.beat = 2.0);
        hub.tick();
        hub.tick();
        clock.update(|s| s.beat = 2.005);
        hub.tick();
        assert_eq!(drain(&mut a.events).len(), 1);
    }

    #[tokio::test]
    async fn no_update_after_last_disconnect() {
        let (mut hub, clock) = hub();
        let mut a = hub.connect();
        let mut b = hub.connect();
        hub.disconnect(a.session);
        hub.disconnect(b.session);
        assert!(!hub.is_polling());

        clock.update(|s| {
            s.beat = 50.0;
            s.bpm = 90.0;
        });
        hub.tick();

        assert_eq!(drain(&mut a.events).len(), 1);
        assert_eq!(drain(&mut b.events).len(), 1);
        assert!(matches!(a.events.try_recv(), Err(TryRecvError::Disconnected)));
        assert!(matches!(b.events.try_recv(), Err(TryRecvError::Disconnected)));
    }

    #[tokio::test(start_paused = true)]
    async fn second_connect_does_not_restart_timer() {
        let (mut hub, clock) = hub();
        let _a = hub.connect();
        let started = tokio::time::Instant::now();

        clock.update(|s| s.beat = 3.0);
        tokio::time::advance(Duration::from_millis(30)).await;
        let mut b = hub.connect();
        let last_before = hub.poller.last_broadcast();

        hub.next_tick().await;
        assert_eq!(started.elapsed(), PERIOD);
        assert_eq!(hub.poller.last_broadcast(), last_before);

        hub.tick();
        let events = drain(&mut b.events);
        assert_eq!(events.len(), 2);
        assert!(matches!(events.get(1), Some(ServerEvent::LinkUpdate(_))));
    }

    #[tokio::test]
    async fn clock_is_reachable_through_hub() {
        let (mut hub, _clock) = hub();
        let a = hub.connect();
        hub.command(a.session, ClientCommand::SetBpm(111.0));
        assert_eq!(hub.clock().get().bpm, 111.0);
    }

    #[tokio::test]
    async fn full_outbox_drops_for_slow_observer_only() {
        let clock = SharedClock::new();
        let mut hub = SessionHub::new(clock.clone(), PERIOD).with_outbox_capacity(1);
        let mut slow = hub.connect();
        let mut fast = hub.connect();
        drain(&mut fast.events);

        clock.update(|s| s.beat = 4.0);
        hub.tick();

        // The slow observer's single slot still holds its snapshot.
        let slow_events = drain(&mut slow.events);
        assert!(matches!(slow_events.as_slice(), [ServerEvent::LinkStatus(_)]));
        assert_eq!(drain(&mut fast.events).len(), 1);
    }

    #[tokio::test]
    async fn zero_outbox_capacity_is_raised_to_one() {
        let (hub, _clock) = hub();
        let mut hub = hub.with_outbox_capacity(0);
        let mut a = hub.connect();
        assert_eq!(drain(&mut a.events).len(), 1);
    }

    #[tokio::test]
    async fn set_bpm_reaches_everyone_including_issuer() {
        let (mut hub, clock) = hub();
        let mut a = hub.connect();
        let mut b = hub.connect();
        drain(&mut a.events);
        drain(&mut b.events);

        hub.command(a.session, ClientCommand::SetBpm(140.0));

        assert_eq!(clock.get().bpm, 140.0);
        assert_eq!(drain(&mut a.events), vec![ServerEvent::BpmChanged(140.0)]);
        assert_eq!(drain(&mut b.events), vec![ServerEvent::BpmChanged(140.0)]);
    }

    #[tokio::test]
    async fn invalid_bpm_changes_nothing() {
        let (mut hub, clock) = hub();
        let mut a = hub.connect();
        drain(&mut a.events);

        hub.command(a.session, ClientCommand::SetBpm(-5.0));
        hub.command(a.session, ClientCommand::SetBpm(f64::NAN));

        assert_eq!(clock.get().bpm, 120.0);
        assert!(drain(&mut a.events).is_empty());
    }

    #[tokio::test]
    async fn set_beat_is_carried_by_next_tick() {
        let (mut hub, clock) = hub();
        let mut a = hub.connect();
        drain(&mut a.events);

        hub.command(a.session, ClientCommand::SetBeat(12.0));
        assert!(drain(&mut a.events).is_empty());
        assert_eq!(clock.get().beat, 12.0);

        hub.tick();
        let events = drain(&mut a.events);
        assert!(matches!(
            events.as_slice(),
            [ServerEvent::LinkUpdate(sample)] if sample.beat == 12.0
        ));
    }

    #[tokio::test]
    async fn transport_is_announced_to_all() {
        let (mut hub, _clock) = hub();
        let mut a = hub.connect();
        let mut b = hub.connect();
        drain(&mut a.events);
        drain(&mut b.events);

        hub.command(b.session, ClientCommand::Transport(TransportCommand::Start));
        let expected = vec![ServerEvent::TransportState(TransportState::Started)];
        assert_eq!(drain(&mut a.events), expected);
        assert_eq!(drain(&mut b.events), expected);
    }

    #[tokio::test]
    async fn command_from_unknown_session_is_dropped() {
        let (mut hub, clock) = hub();
        let mut a = hub.connect();
        drain(&mut a.events);

        hub.command(SessionId::new(), ClientCommand::SetBpm(99.0));
        assert_eq!(clock.get().bpm, 120.0);
        assert!(drain(&mut a.events).is_empty());
    }

    #[tokio::test]
    async fn events_arrive_in_same_order_for_everyone() {
        let (mut hub, clock) = hub();
        let mut a = hub.connect();
        let mut b = hub.connect();
        drain(&mut a.events);
        drain(&mut b.events);

        clock.update(|s| s.num_peers = 1);
        hub.tick();
        hub.command(a.session, ClientCommand::SetBpm(100.0));
        hub.tick();
        hub.command(b.session, ClientCommand::Transport(TransportCommand::Stop));

        let seen_a = drain(&mut a.events);
        let seen_b = drain(&mut b.events);
        assert_eq!(seen_a.len(), 4);
        assert_eq!(seen_a, seen_b);
    }

    #[tokio::test]
    async fn status_reports_clock_and_sessions() {
        let (mut hub, clock) = hub();
        clock.update(|s| s.num_peers = 3);
        let _a = hub.connect();
        let _b = hub.connect();

        let report = hub.status();
        assert_eq!(report.status, "running");
        assert_eq!(report.num_peers, 3);
        assert_eq!(report.bpm, 120.0);
        assert_eq!(report.connected_clients, 2);
    }

    #[tokio::test]
    async fn abandoned_connect_is_rolled_back() {
        let (mut hub, _clock) = hub();
        let (reply, rx) = oneshot::channel();
        drop(rx);
        assert!(hub.handle(HubEvent::Connect { reply }).is_continue());
        assert_eq!(hub.session_count(), 0);
        assert!(!hub.is_polling());
    }

    #[tokio::test]
    async fn shutdown_stops_loop_and_breaks() {
        let (mut hub, _clock) = hub();
        let mut a = hub.connect();
        drain(&mut a.events);
        assert!(hub.handle(HubEvent::Shutdown).is_break());
        assert!(!hub.is_polling());
        assert_eq!(hub.session_count(), 0);
        assert!(matches!(a.events.try_recv(), Err(TryRecvError::Disconnected)));
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_hub_streams_updates() {
        let clock = SharedClock::new();
        let (handle, task) = spawn(SessionHub::new(clock.clone(), PERIOD));

        let mut conn = handle.connect().await.unwrap();
        let first = conn.events.recv().await.unwrap();
        assert!(matches!(first, ServerEvent::LinkStatus(_)));

        clock.update(|s| s.beat = 5.0);
        let update = conn.events.recv().await.unwrap();
        assert_eq!(update, ServerEvent::LinkUpdate(clock.get()));

        handle.command(conn.session, ClientCommand::SetBpm(150.0)).await.unwrap();
        assert_eq!(conn.events.recv().await.unwrap(), ServerEvent::BpmChanged(150.0));

        let report = handle.status().await.unwrap();
        assert_eq!(report.connected_clients, 1);
        assert_eq!(report.bpm, 150.0);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert!(matches!(handle.connect().await, Err(HubError::Closed)));
    }

    #[tokio::test]
    async fn hub_exits_when_handles_drop() {
        let (handle, task) = spawn(SessionHub::new(SharedClock::new(), PERIOD));
        drop(handle);
        task.await.unwrap();
    }
}
