//! The clock poll loop.
//!
//! [`BroadcastLoop`] is a two-state machine. While `Idle` there is no
//! timer at all; while `Polling` it owns a [`tokio::time::Interval`] at
//! the configured period. Stopping drops the interval, so once the last
//! observer leaves no further tick can fire. The last broadcast state
//! survives stop/start cycles so a quick reconnect does not re-emit an
//! unchanged clock.

use std::time::Duration;

use tempo_types::ClockSample;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{info, trace, warn};

use crate::adapter::{AdapterError, ClockAdapter};
use crate::filter::{LastBroadcastState, should_emit};

/// Poll loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// No timer is running.
    Idle,
    /// The timer is running.
    Polling,
}

/// Samples the clock on a fixed interval and filters out redundant
/// readings.
#[derive(Debug)]
pub struct BroadcastLoop {
    period: Duration,
    timer: Option<Interval>,
    last: LastBroadcastState,
}

impl BroadcastLoop {
    /// Create an idle loop. Periods below one millisecond are raised to
    /// one millisecond.
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
            timer: None,
            last: LastBroadcastState::default(),
        }
    }

    /// Idle -> Polling. Returns `false` (and leaves the running timer
    /// alone) if already polling.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self) -> bool {
        if self.timer.is_some() {
            return false;
        }
        let first = tokio::time::Instant::now() + self.period;
        let mut timer = tokio::time::interval_at(first, self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.timer = Some(timer);
        info!(period = ?self.period, "Clock polling started");
        true
    }

    /// Polling -> Idle. Returns `false` if already idle.
    pub fn stop(&mut self) -> bool {
        if self.timer.take().is_none() {
            return false;
        }
        info!("Clock polling stopped");
        true
    }

    /// Current state.
    pub const fn state(&self) -> LoopState {
        if self.timer.is_some() {
            LoopState::Polling
        } else {
            LoopState::Idle
        }
    }

    /// Whether the timer is running.
    pub const fn is_polling(&self) -> bool {
        self.timer.is_some()
    }

    /// Configured poll period.
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// The last sample that passed the filter.
    pub const fn last_broadcast(&self) -> LastBroadcastState {
        self.last
    }

    /// Wait for the next scheduled tick. Never resolves while idle.
    pub async fn next_tick(&mut self) {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    /// Run one tick: sample the clock and return the sample if it should
    /// be broadcast.
    ///
    /// A tick while idle is a straggler from before `stop()` and is
    /// dropped. A failed read is logged and skipped; the loop keeps
    /// running.
    pub fn tick<C>(&mut self, clock: &C) -> Option<ClockSample>
    where
        C: ClockAdapter + ?Sized,
    {
        if self.timer.is_none() {
            trace!("Tick while idle dropped");
            return None;
        }

        let sample = match read(clock) {
            Ok(sample) => sample,
            Err(e) => {
                warn!(error = %e, "Clock sample failed, skipping tick");
                return None;
            }
        };

        if !should_emit(&sample, &self.last) {
            return None;
        }
        self.last = LastBroadcastState::from_sample(&sample);
        Some(sample)
    }
}

fn read<C>(clock: &C) -> Result<ClockSample, AdapterError>
where
    C: ClockAdapter + ?Sized,
{
    let sample = clock.sample()?;
    if sample.is_finite() {
        Ok(sample)
    } else {
        Err(AdapterError::InvalidSample(format!("{sample:?}")))
    }
}
