//! The seam between the relay and the shared tempo clock.
//!
//! [`ClockAdapter`] is the only interface the relay has to the external
//! peer-synchronized clock. Peer discovery and tempo agreement happen
//! behind it; the relay only samples, and occasionally writes tempo or
//! beat position on an observer's behalf.
//!
//! Implementations must not block in [`ClockAdapter::sample`]: it runs on
//! the hub task between other observers' events. A clock whose reads can
//! block should be sampled on its own task and fed to the hub as events.

use tempo_types::ClockSample;

/// Tempo every clock starts at unless configured otherwise.
pub const DEFAULT_BPM: f64 = 120.0;

/// Errors raised by a clock adapter.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The clock could not be read this tick.
    #[error("clock unavailable: {0}")]
    Unavailable(String),

    /// The clock returned values that cannot be broadcast.
    #[error("invalid clock sample: {0}")]
    InvalidSample(String),

    /// The clock was constructed with out-of-range parameters.
    #[error("invalid clock configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

/// A peer-synchronized tempo clock.
pub trait ClockAdapter: Send {
    /// Read the current beat, phase, tempo and peer count.
    fn sample(&self) -> Result<ClockSample, AdapterError>;

    /// Number of remote peers currently in the session.
    fn num_peers(&self) -> u64;

    /// Current tempo.
    fn bpm(&self) -> f64;

    /// Propose a new tempo to the session.
    fn set_bpm(&mut self, bpm: f64);

    /// Move the beat position.
    fn set_beat(&mut self, beat: f64);

    /// Join the session. Called when the first observer connects; the
    /// default does nothing.
    fn enable(&mut self) {}
}
