//! # Configuration Module
//!
//! Settings the host application exposes for one tuner instance. All values are
//! fixed when a [`crate::capture::CaptureLoop`] or [`crate::pitch::PitchDetector`]
//! is constructed, except `vibrate`, which can be toggled on a running detector.
//!
//! Configurations are stored as JSON. Missing fields fall back to their defaults,
//! so a file containing only `{"fft_size": 16384}` is valid.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TunerError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunerConfig {
    /// Capture sample rate in Hz.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Samples read from the device per cycle.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Transform length. Power of two, at least `buffer_size`.
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default = "default_low_cutoff_hz")]
    pub low_cutoff_hz: f32,
    #[serde(default = "default_high_cutoff_hz")]
    pub high_cutoff_hz: f32,
    /// Number of downsampled copies added to the harmonic product spectrum.
    #[serde(default = "default_hps_order")]
    pub hps_order: usize,
    /// Consecutive matching cycles required before a feedback event.
    #[serde(default = "default_debounce_cycles")]
    pub debounce_cycles: u32,
    /// Sink rejections tolerated in a row before the capture loop aborts.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
    /// Frequency of A4 in Hz.
    #[serde(default = "default_concert_pitch")]
    pub concert_pitch: f32,
    #[serde(default)]
    pub vibrate: bool,
}

fn default_sample_rate() -> u32 {
    8000
}

fn default_buffer_size() -> usize {
    4096
}

fn default_fft_size() -> usize {
    32768
}

fn default_low_cutoff_hz() -> f32 {
    50.0
}

fn default_high_cutoff_hz() -> f32 {
    2500.0
}

fn default_hps_order() -> usize {
    3
}

fn default_debounce_cycles() -> u32 {
    3
}

fn default_max_consecutive_failures() -> u32 {
    10
}

fn default_concert_pitch() -> f32 {
    440.0
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            buffer_size: default_buffer_size(),
            fft_size: default_fft_size(),
            low_cutoff_hz: default_low_cutoff_hz(),
            high_cutoff_hz: default_high_cutoff_hz(),
            hps_order: default_hps_order(),
            debounce_cycles: default_debounce_cycles(),
            max_consecutive_failures: default_max_consecutive_failures(),
            concert_pitch: default_concert_pitch(),
            vibrate: false,
        }
    }
}

impl TunerConfig {
    /// How often a full cycle completes, in Hz (`sample_rate / buffer_size`).
    pub fn cycle_rate(&self) -> f32 {
        self.sample_rate as f32 / self.buffer_size as f32
    }

    /// Number of bins in the magnitude spectrum handed to the detector.
    pub fn spectrum_len(&self) -> usize {
        self.fft_size / 2
    }

    /// Checks every value that would otherwise break the pipeline at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(TunerError::Config("sample_rate cannot be zero".into()));
        }
        if self.buffer_size == 0 {
            return Err(TunerError::Config("buffer_size cannot be zero".into()));
        }
        if !self.fft_size.is_power_of_two() {
            return Err(TunerError::Config(format!(
                "fft_size must be a power of two, got {}",
                self.fft_size
            )));
        }
        if self.fft_size < self.buffer_size {
            return Err(TunerError::Config(format!(
                "fft_size ({}) must not be smaller than buffer_size ({})",
                self.fft_size, self.buffer_size
            )));
        }
        if !(self.low_cutoff_hz >= 0.0 && self.low_cutoff_hz < self.high_cutoff_hz) {
            return Err(TunerError::Config(format!(
                "cutoff band {}..{} Hz is empty",
                self.low_cutoff_hz, self.high_cutoff_hz
            )));
        }
        let nyquist = self.sample_rate as f32 / 2.0;
        if self.low_cutoff_hz >= nyquist {
            return Err(TunerError::Config(format!(
                "low_cutoff_hz ({}) must be below the Nyquist frequency ({nyquist})",
                self.low_cutoff_hz
            )));
        }
        if !(self.concert_pitch > 0.0) {
            return Err(TunerError::Config("concert_pitch must be positive".into()));
        }
        if self.debounce_cycles == 0 {
            return Err(TunerError::Config("debounce_cycles cannot be zero".into()));
        }
        Ok(())
    }

    /// Loads a configuration from a JSON file and validates it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut data = String::new();
        file.read_to_string(&mut data)?;
        let config: TunerConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json_string = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json_string.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_pipeline() {
        let config = TunerConfig::default();
        assert_eq!(config.sample_rate, 8000);
        assert_eq!(config.buffer_size, 4096);
        assert_eq!(config.fft_size, 32768);
        assert_eq!(config.hps_order, 3);
        assert_eq!(config.debounce_cycles, 3);
        assert_eq!(config.max_consecutive_failures, 10);
        assert!(!config.vibrate);
        assert_eq!(config.spectrum_len(), 16384);
        assert!((config.cycle_rate() - 1.953_125).abs() < 1e-6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: TunerConfig =
            serde_json::from_str(r#"{"fft_size": 16384, "vibrate": true}"#).unwrap();
        assert_eq!(config.fft_size, 16384);
        assert!(config.vibrate);
        assert_eq!(config.sample_rate, 8000);
        assert_eq!(config.high_cutoff_hz, 2500.0);
    }

    #[test]
    fn rejects_fft_smaller_than_buffer() {
        let config = TunerConfig {
            fft_size: 2048,
            ..TunerConfig::default()
        };
        assert!(matches!(config.validate(), Err(TunerError::Config(_))));
    }

    #[test]
    fn rejects_non_power_of_two_fft() {
        let config = TunerConfig {
            fft_size: 30000,
            ..TunerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_cutoffs() {
        let config = TunerConfig {
            low_cutoff_hz: 3000.0,
            high_cutoff_hz: 2500.0,
            ..TunerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn save_then_load() {
        let path = std::env::temp_dir().join(format!("tuner-config-{}.json", std::process::id()));
        let config = TunerConfig {
            concert_pitch: 442.0,
            fft_size: 16384,
            ..TunerConfig::default()
        };
        config.save(&path).unwrap();
        let loaded = TunerConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }
}
