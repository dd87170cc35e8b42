// tuner-core/src/lib.rs

//! The core logic for the instrument tuner.
//! This crate captures audio, turns each frame into a log-magnitude spectrum
//! and classifies the dominant pitch against equal temperament. It is
//! completely headless; results leave through a [`sink::ResultSink`].

pub mod audio;
pub mod capture;
pub mod config;
pub mod error;
pub mod fft;
pub mod pitch;
pub mod sink;
pub mod tuning;

pub use capture::{CaptureLoop, StopHandle};
pub use config::TunerConfig;
pub use error::TunerError;
pub use pitch::PitchDetector;

use serde::{Deserialize, Serialize};

/// Vibration pattern for "tune up".
pub const TUNE_UP_PATTERN: [u64; 2] = [0, 200];
/// Vibration pattern for "tune down".
pub const TUNE_DOWN_PATTERN: [u64; 4] = [0, 200, 200, 200];
/// Vibration pattern for "in tune".
pub const TUNED_PATTERN: [u64; 6] = [0, 100, 100, 100, 100, 100];

/// Discrete guidance emitted once a pitch has been stable for a few cycles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum TuningFeedback {
    /// Below the tolerance band by `by_hz`.
    TuneUp { by_hz: f32 },
    /// Above the tolerance band by `by_hz`.
    TuneDown { by_hz: f32 },
    /// Inside the band; `error_hz` is detected minus target.
    Tuned { error_hz: f32 },
}

impl TuningFeedback {
    /// The haptic pattern announcing this verdict.
    pub fn pattern(&self) -> &'static [u64] {
        match self {
            TuningFeedback::TuneUp { .. } => &TUNE_UP_PATTERN,
            TuningFeedback::TuneDown { .. } => &TUNE_DOWN_PATTERN,
            TuningFeedback::Tuned { .. } => &TUNED_PATTERN,
        }
    }
}

/// Represents the result of a single detector cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PitchResult {
    /// The frequency judged most relevant this cycle, in Hz.
    pub detected_frequency: f32,
    /// Frequency of the nearest equal-tempered pitch.
    pub target_frequency: f32,
    /// Semitones from A1 of the target pitch.
    pub target_pitch_index: i32,
    /// False when the detected frequency is below A1 (noise or silence).
    pub valid: bool,
    /// True when valid and inside the tolerance band of the target.
    pub tuned: bool,
    /// Peak of the harmonic product spectrum, in Hz.
    pub strongest_frequency: f32,
    /// Width of one spectrum bin in Hz.
    pub hz_per_bin: f32,
    /// Set on the cycle a debounced verdict was reached.
    pub feedback: Option<TuningFeedback>,
}

impl PitchResult {
    /// Name of the target pitch, e.g. "a2".
    pub fn label(&self) -> String {
        tuning::pitch_name(self.target_pitch_index)
    }

    /// Deviation of the detected frequency from the target, in cents.
    pub fn cents(&self) -> Option<f32> {
        self.valid
            .then(|| tuning::cents_between(self.detected_frequency, self.target_frequency))
    }
}
