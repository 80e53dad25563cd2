//! Change detection for periodic clock broadcasts.
//!
//! A solo clock only goes on the wire when it has moved noticeably. Once
//! any remote peer is present every sample is sent, since peers can
//! change tempo or position at any moment and observers must follow.

use tempo_types::ClockSample;

use crate::adapter::DEFAULT_BPM;

/// Minimum beat movement worth broadcasting.
pub const BEAT_THRESHOLD: f64 = 0.01;

/// Minimum phase movement worth broadcasting.
pub const PHASE_THRESHOLD: f64 = 0.01;

/// Minimum tempo change worth broadcasting.
pub const BPM_THRESHOLD: f64 = 0.1;

/// The last sample that was actually broadcast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LastBroadcastState {
    /// Beat of the last emitted sample.
    pub beat: f64,
    /// Phase of the last emitted sample.
    pub phase: f64,
    /// Tempo of the last emitted sample.
    pub bpm: f64,
}

impl LastBroadcastState {
    /// Record an emitted sample.
    pub const fn from_sample(sample: &ClockSample) -> Self {
        Self {
            beat: sample.beat,
            phase: sample.phase,
            bpm: sample.bpm,
        }
    }
}

impl Default for LastBroadcastState {
    fn default() -> Self {
        Self {
            beat: 0.0,
            phase: 0.0,
            bpm: DEFAULT_BPM,
        }
    }
}

/// Decide whether `sample` should be broadcast given the last emission.
pub const fn should_emit(sample: &ClockSample, last: &LastBroadcastState) -> bool {
    let beat_changed = (sample.beat - last.beat).abs() > BEAT_THRESHOLD;
    let phase_changed = (sample.phase - last.phase).abs() > PHASE_THRESHOLD;
    let bpm_changed = (sample.bpm - last.bpm).abs() > BPM_THRESHOLD;
    let has_peers = sample.num_peers > 0;

    beat_changed || phase_changed || bpm_changed || has_peers
}
