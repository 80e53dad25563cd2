//! Free-running solo clock.
//!
//! [`LocalClock`] stands in for a peer session when the relay runs
//! without one. It never has peers. The beat advances at `bpm / 60`
//! beats per second from a rebase point, and the phase is the beat
//! modulo the quantum. Tempo and beat writes rebase the timeline so the
//! beat never jumps except when set explicitly.

use std::time::Instant;

use tempo_types::ClockSample;
use tracing::debug;

use crate::adapter::{AdapterError, ClockAdapter};

const SECONDS_PER_MINUTE: f64 = 60.0;

/// A tempo clock driven by the local monotonic clock.
#[derive(Debug, Clone)]
pub struct LocalClock {
    bpm: f64,
    quantum: f64,
    origin: Instant,
    origin_beat: f64,
    enabled: bool,
}

impl LocalClock {
    /// Create a clock at beat 0 with the given tempo and bar length.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::InvalidConfig`] unless both `bpm` and
    /// `quantum` are finite and positive.
    pub fn new(bpm: f64, quantum: f64) -> Result<Self, AdapterError> {
        Self::starting_at(bpm, quantum, Instant::now())
    }

    /// Like [`LocalClock::new`] with an explicit origin instant.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::InvalidConfig`] unless both `bpm` and
    /// `quantum` are finite and positive.
    pub fn starting_at(bpm: f64, quantum: f64, origin: Instant) -> Result<Self, AdapterError> {
        if !(bpm.is_finite() && bpm > 0.0) {
            return Err(AdapterError::InvalidConfig {
                reason: format!("bpm must be positive, got {bpm}"),
            });
        }
        if !(quantum.is_finite() && quantum > 0.0) {
            return Err(AdapterError::InvalidConfig {
                reason: format!("quantum must be positive, got {quantum}"),
            });
        }
        Ok(Self {
            bpm,
            quantum,
            origin,
            origin_beat: 0.0,
            enabled: false,
        })
    }

    /// Beat position at `now`.
    pub fn beat_at(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.origin).as_secs_f64();
        elapsed.mul_add(self.bpm / SECONDS_PER_MINUTE, self.origin_beat)
    }

    /// Phase within the bar at `now`.
    pub fn phase_at(&self, now: Instant) -> f64 {
        self.beat_at(now).rem_euclid(self.quantum)
    }

    /// Sample the clock at an explicit instant.
    pub fn sample_at(&self, now: Instant) -> ClockSample {
        ClockSample {
            beat: self.beat_at(now),
            phase: self.phase_at(now),
            bpm: self.bpm,
            num_peers: 0,
        }
    }

    /// Whether [`ClockAdapter::enable`] has been called.
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Beats per bar.
    pub const fn quantum(&self) -> f64 {
        self.quantum
    }

    fn rebase(&mut self, now: Instant, beat: f64) {
        self.origin = now;
        self.origin_beat = beat;
    }
}

impl ClockAdapter for LocalClock {
    fn sample(&self) -> Result<ClockSample, AdapterError> {
        let sample = self.sample_at(Instant::now());
        if sample.is_finite() {
            Ok(sample)
        } else {
            Err(AdapterError::InvalidSample(format!("{sample:?}")))
        }
    }

    fn num_peers(&self) -> u64 {
        0
    }

    fn bpm(&self) -> f64 {
        self.bpm
    }

    fn set_bpm(&mut self, bpm: f64) {
        let now = Instant::now();
        let beat = self.beat_at(now);
        self.rebase(now, beat);
        self.bpm = bpm;
    }

    fn set_beat(&mut self, beat: f64) {
        self.rebase(Instant::now(), beat);
    }

    fn enable(&mut self) {
        if !self.enabled {
            debug!(bpm = self.bpm, quantum = self.quantum, "Local clock enabled");
        }
        self.enabled = true;
    }
}
