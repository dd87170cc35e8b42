//! # Pitch Detection Module
//!
//! Turns one log-magnitude spectrum per cycle into a [`PitchResult`].
//!
//! ## Pipeline
//! 1. Band-pass: bins outside the instrument range are silenced
//! 2. Harmonic product spectrum: every bin is reinforced by the bins at its
//!    integer multiples, which suppresses octave errors
//! 3. Peak pick and mapping to the nearest equal-tempered pitch
//! 4. Debounce: a verdict (tune up / tune down / tuned) is only given after the
//!    same frequency has been seen for several consecutive cycles

use crate::config::TunerConfig;
use crate::sink::{HapticFeedback, ResultSink};
use crate::tuning::EqualTemperament;
use crate::{PitchResult, TuningFeedback};

/// Relative drift between two cycles still treated as the same pitch.
const HOLD_TOLERANCE: f32 = 0.01;

/// Detector state carried from one cycle to the next.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TunerState {
    /// Detected frequency of the previous cycle. `None` before the first cycle.
    pub last_detected_frequency: Option<f32>,
    /// Target frequency of the previous cycle.
    pub last_target_frequency: Option<f32>,
    /// Consecutive cycles the detected frequency stayed within 1% of the previous one.
    pub pitch_hold_counter: u32,
    pub vibrate: bool,
}

/// Stateful spectrum classifier.
///
/// Every call to [`PitchDetector::process`] produces exactly one result, hands it
/// to the sink and then commits the new state.
pub struct PitchDetector<S> {
    scale: EqualTemperament,
    low_cutoff_hz: f32,
    high_cutoff_hz: f32,
    hps_order: usize,
    debounce_cycles: u32,
    state: TunerState,
    hps: Vec<f32>,
    last_result: Option<PitchResult>,
    sink: S,
    haptics: Option<Box<dyn HapticFeedback + Send>>,
}

impl<S: ResultSink> PitchDetector<S> {
    pub fn new(config: &TunerConfig, sink: S) -> Self {
        Self {
            scale: EqualTemperament::new(config.concert_pitch),
            low_cutoff_hz: config.low_cutoff_hz,
            high_cutoff_hz: config.high_cutoff_hz,
            hps_order: config.hps_order,
            debounce_cycles: config.debounce_cycles,
            state: TunerState {
                vibrate: config.vibrate,
                ..TunerState::default()
            },
            hps: vec![f32::NEG_INFINITY; config.spectrum_len()],
            last_result: None,
            sink,
            haptics: None,
        }
    }

    /// Plays feedback patterns on `haptics` while vibration is enabled.
    pub fn with_haptics(mut self, haptics: impl HapticFeedback + Send + 'static) -> Self {
        self.haptics = Some(Box::new(haptics));
        self
    }

    /// Classifies one spectrum and reports the result to the sink.
    ///
    /// # Arguments
    /// * `mag` - Log10 magnitudes, one per bin up to the Nyquist frequency. Masked in place.
    /// * `sample_rate` - Sample rate the spectrum was computed at, in Hz
    /// * `cycle_rate` - Cycles per second, forwarded to the sink
    ///
    /// # Returns
    /// * Whether the sink accepted the result
    pub fn process(&mut self, mag: &mut [f32], sample_rate: u32, cycle_rate: f32) -> bool {
        let hz_per_bin = (sample_rate as f32 / 2.0) / mag.len() as f32;

        apply_band_pass(mag, hz_per_bin, self.low_cutoff_hz, self.high_cutoff_hz);

        if self.hps.len() != mag.len() {
            self.hps = vec![f32::NEG_INFINITY; mag.len()];
        }
        harmonic_product_spectrum(mag, &mut self.hps, self.hps_order);

        let strongest_frequency = peak_index(&self.hps) as f32 * hz_per_bin;
        let detected_frequency = strongest_frequency;
        let target_pitch_index = self.scale.pitch_index(detected_frequency);
        let target_frequency = self.scale.frequency(target_pitch_index);
        let valid = detected_frequency >= self.scale.frequency(0);

        let mut pitch_hold_counter = match self.state.last_detected_frequency {
            _ if !valid => {
                log::debug!(
                    "Detected frequency {:.2} Hz is below the lowest pitch, ignoring cycle",
                    detected_frequency
                );
                0
            }
            Some(last) if is_same_pitch(detected_frequency, last) => {
                log::debug!(
                    "Detected frequency {:.2} Hz matches the last cycle",
                    detected_frequency
                );
                self.state.pitch_hold_counter.saturating_add(1)
            }
            Some(last) => {
                log::debug!(
                    "Detected frequency {:.2} Hz differs from the last ({:.2} Hz)",
                    detected_frequency,
                    last
                );
                0
            }
            None => 0,
        };

        let mut feedback = None;
        if pitch_hold_counter >= self.debounce_cycles {
            let verdict = classify(&self.scale, detected_frequency, target_pitch_index);
            log_verdict(&verdict, target_frequency);
            if self.state.vibrate {
                if let Some(haptics) = self.haptics.as_mut() {
                    haptics.vibrate(verdict.pattern());
                }
            }
            feedback = Some(verdict);
            pitch_hold_counter = 0;
        }

        let result = PitchResult {
            detected_frequency,
            target_frequency,
            target_pitch_index,
            valid,
            tuned: valid && self.scale.is_within_tolerance(detected_frequency, target_pitch_index),
            strongest_frequency,
            hz_per_bin,
            feedback,
        };

        let accepted = self.sink.accept(&result, self.last_result.as_ref(), cycle_rate);

        self.state.last_detected_frequency = Some(detected_frequency);
        self.state.last_target_frequency = Some(target_frequency);
        self.state.pitch_hold_counter = pitch_hold_counter;
        self.last_result = Some(result);
        accepted
    }
}

impl<S> PitchDetector<S> {
    pub fn state(&self) -> &TunerState {
        &self.state
    }

    /// The result committed by the most recent cycle.
    pub fn last_result(&self) -> Option<&PitchResult> {
        self.last_result.as_ref()
    }

    /// Harmonic product spectrum of the most recent cycle.
    pub fn hps(&self) -> &[f32] {
        &self.hps
    }

    pub fn set_vibrate(&mut self, vibrate: bool) {
        self.state.vibrate = vibrate;
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

fn is_same_pitch(frequency: f32, last: f32) -> bool {
    frequency > last * (1.0 - HOLD_TOLERANCE) && frequency < last * (1.0 + HOLD_TOLERANCE)
}

fn log_verdict(verdict: &TuningFeedback, target_frequency: f32) {
    match verdict {
        TuningFeedback::TuneUp { by_hz } => log::info!(
            "Tune up by {:.2} Hz! Target frequency is {:.2} Hz.",
            by_hz, target_frequency
        ),
        TuningFeedback::TuneDown { by_hz } => log::info!(
            "Tune down by {:.2} Hz! Target frequency is {:.2} Hz.",
            by_hz, target_frequency
        ),
        TuningFeedback::Tuned { error_hz } => log::info!(
            "TUNED! Target frequency is {:.2} Hz (error: {:.2} Hz).",
            target_frequency, error_hz
        ),
    }
}

/// Sets every bin outside `[low_cutoff_hz, high_cutoff_hz)` to negative infinity.
///
/// A bin's frequency is `index * hz_per_bin`.
pub fn apply_band_pass(
    mag: &mut [f32],
    hz_per_bin: f32,
    low_cutoff_hz: f32,
    high_cutoff_hz: f32,
) {
    for (i, m) in mag.iter_mut().enumerate() {
        let frequency = i as f32 * hz_per_bin;
        if frequency < low_cutoff_hz || frequency >= high_cutoff_hz {
            *m = f32::NEG_INFINITY;
        }
    }
}

/// Computes the harmonic product spectrum of a log-magnitude spectrum.
///
/// Only the first `mag.len() / (order + 1)` bins can be reinforced by all
/// harmonics; the rest of `hps` is set to negative infinity. Because the input
/// is logarithmic, the product becomes a sum of the downsampled copies, each
/// downsampled by averaging `factor` neighbouring bins.
///
/// # Arguments
/// * `mag` - Log-magnitude spectrum
/// * `hps` - Output, overwritten
/// * `order` - Number of harmonics added; 0 copies `mag`
///
/// # Panics
/// * If `mag` and `hps` differ in length
pub fn harmonic_product_spectrum(mag: &[f32], hps: &mut [f32], order: usize) {
    assert_eq!(
        mag.len(),
        hps.len(),
        "magnitude and harmonic product spectra must have the same length"
    );

    let hps_len = mag.len() / (order + 1);
    for (i, h) in hps.iter_mut().enumerate() {
        *h = if i < hps_len { mag[i] } else { f32::NEG_INFINITY };
    }

    for harmonic in 1..=order {
        let factor = harmonic + 1;
        for (index, h) in hps.iter_mut().take(hps_len).enumerate() {
            let start = index * factor;
            let sum: f32 = mag[start..start + factor].iter().sum();
            *h += sum / factor as f32;
        }
    }
}

/// Index of the largest value; the first one wins on ties.
fn peak_index(values: &[f32]) -> usize {
    let mut max_index = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[max_index] {
            max_index = i;
        }
    }
    max_index
}

/// Compares a detected frequency with the tolerance band of its target pitch.
pub fn classify(
    scale: &EqualTemperament,
    detected_frequency: f32,
    target_index: i32,
) -> TuningFeedback {
    let target_frequency = scale.frequency(target_index);
    if detected_frequency < scale.lower_bound(target_index) {
        TuningFeedback::TuneUp {
            by_hz: target_frequency - detected_frequency,
        }
    } else if detected_frequency > scale.upper_bound(target_index) {
        TuningFeedback::TuneDown {
            by_hz: detected_frequency - target_frequency,
        }
    } else {
        TuningFeedback::Tuned {
            error_hz: detected_frequency - target_frequency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    const SAMPLE_RATE: u32 = 8000;
    const SPECTRUM_LEN: usize = 16384;
    const HZ_PER_BIN: f32 = 4000.0 / 16384.0;

    #[derive(Default)]
    struct RecordingSink {
        results: Vec<PitchResult>,
        previous: Vec<Option<PitchResult>>,
    }

    impl ResultSink for RecordingSink {
        fn accept(
            &mut self,
            result: &PitchResult,
            last: Option<&PitchResult>,
            _cycle_rate_hz: f32,
        ) -> bool {
            self.results.push(result.clone());
            self.previous.push(last.cloned());
            true
        }
    }

    #[derive(Clone, Default)]
    struct SharedHaptics(Arc<Mutex<Vec<Vec<u64>>>>);

    impl HapticFeedback for SharedHaptics {
        fn vibrate(&mut self, pattern: &[u64]) {
            self.0.lock().unwrap().push(pattern.to_vec());
        }
    }

    /// A flat floor with one strong bin.
    fn spectrum_with_peak(bin: usize) -> Vec<f32> {
        let mut mag = vec![-10.0; SPECTRUM_LEN];
        mag[bin] = 0.0;
        mag
    }

    fn detector() -> PitchDetector<RecordingSink> {
        PitchDetector::new(&TunerConfig::default(), RecordingSink::default())
    }

    #[test]
    fn band_pass_masks_outside_bins_only() {
        let mut mag: Vec<f32> = (0..SPECTRUM_LEN).map(|i| i as f32 * 0.001).collect();
        let original = mag.clone();
        apply_band_pass(&mut mag, HZ_PER_BIN, 50.0, 2500.0);

        for (i, (&masked, &before)) in mag.iter().zip(&original).enumerate() {
            let frequency = i as f32 * HZ_PER_BIN;
            if frequency < 50.0 || frequency >= 2500.0 {
                assert_eq!(masked, f32::NEG_INFINITY, "bin {i} at {frequency} Hz");
            } else {
                assert_eq!(masked, before, "bin {i} at {frequency} Hz");
            }
        }
    }

    #[test]
    fn hps_order_zero_copies_the_input() {
        let mag = vec![1.0, -2.0, 3.5, f32::NEG_INFINITY, 0.25];
        let mut hps = vec![0.0; mag.len()];
        harmonic_product_spectrum(&mag, &mut hps, 0);
        assert_eq!(hps, mag);
    }

    #[test]
    fn hps_adds_averaged_harmonics() {
        let mag = vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        let mut hps = vec![0.0; mag.len()];
        harmonic_product_spectrum(&mag, &mut hps, 1);

        // hps[i] = mag[i] + (mag[2i] + mag[2i + 1]) / 2 for i < 4
        assert_eq!(&hps[..4], &[0.5, 3.5, 6.5, 9.5]);
        assert!(hps[4..].iter().all(|&h| h == f32::NEG_INFINITY));
    }

    #[test]
    #[should_panic(expected = "same length")]
    fn hps_rejects_mismatched_lengths() {
        let mag = vec![0.0; 8];
        let mut hps = vec![0.0; 4];
        harmonic_product_spectrum(&mag, &mut hps, 3);
    }

    #[test]
    fn peak_ties_resolve_to_lowest_index() {
        assert_eq!(peak_index(&[1.0, 3.0, 3.0, 2.0]), 1);
        assert_eq!(peak_index(&[f32::NEG_INFINITY; 4]), 0);
    }

    #[test]
    fn tolerance_classification() {
        let scale = EqualTemperament::default();
        let epsilon = 0.01;

        let below = scale.lower_bound(12) - epsilon;
        assert!(matches!(classify(&scale, below, 12), TuningFeedback::TuneUp { .. }));

        let above = scale.upper_bound(12) + epsilon;
        assert!(matches!(classify(&scale, above, 12), TuningFeedback::TuneDown { .. }));

        let exact = scale.frequency(12);
        assert!(matches!(classify(&scale, exact, 12), TuningFeedback::Tuned { .. }));

        if let TuningFeedback::TuneUp { by_hz } = classify(&scale, 100.0, 12) {
            assert!((by_hz - 10.0).abs() < 1e-4);
        }
    }

    #[test]
    fn strong_bin_maps_to_a2() {
        let mut detector = detector();
        let mut mag = spectrum_with_peak(451);
        assert!(detector.process(&mut mag, SAMPLE_RATE, 1.953));

        let result = detector.last_result().unwrap();
        assert!(result.valid);
        assert_eq!(result.target_pitch_index, 12);
        assert_eq!(result.label(), "a2");
        assert!((result.target_frequency - 110.0).abs() < 1e-4);
        assert!((result.detected_frequency - 451.0 * HZ_PER_BIN).abs() < 1e-3);
        assert!(result.tuned);
        assert!(result.feedback.is_none());
    }

    #[test]
    fn silence_is_invalid() {
        let mut detector = detector();
        let mut mag = vec![f32::NEG_INFINITY; SPECTRUM_LEN];
        detector.process(&mut mag, SAMPLE_RATE, 1.953);

        let result = detector.last_result().unwrap();
        assert!(!result.valid);
        assert!(!result.tuned);
        assert_eq!(result.detected_frequency, 0.0);
        assert!(result.cents().is_none());
    }

    #[test]
    fn first_cycle_is_never_eligible() {
        let mut detector = detector();
        assert!(detector.state().last_detected_frequency.is_none());

        detector.process(&mut spectrum_with_peak(451), SAMPLE_RATE, 1.953);

        assert_eq!(detector.state().pitch_hold_counter, 0);
        assert!(detector.state().last_detected_frequency.is_some());
    }

    #[test]
    fn debounce_emits_once_after_three_matching_cycles() {
        let mut detector = detector();

        // Reference cycle, then three cycles matching it.
        detector.process(&mut spectrum_with_peak(451), SAMPLE_RATE, 1.953);
        detector.process(&mut spectrum_with_peak(451), SAMPLE_RATE, 1.953);
        assert_eq!(detector.state().pitch_hold_counter, 1);
        detector.process(&mut spectrum_with_peak(452), SAMPLE_RATE, 1.953);
        assert_eq!(detector.state().pitch_hold_counter, 2);
        detector.process(&mut spectrum_with_peak(451), SAMPLE_RATE, 1.953);

        assert_eq!(detector.state().pitch_hold_counter, 0);
        let feedback: Vec<_> = detector
            .sink()
            .results
            .iter()
            .map(|r| r.feedback)
            .collect();
        assert_eq!(feedback.iter().filter(|f| f.is_some()).count(), 1);
        assert!(matches!(feedback[3], Some(TuningFeedback::Tuned { .. })));
    }

    #[test]
    fn pitch_change_resets_the_hold_counter() {
        let mut detector = detector();
        detector.process(&mut spectrum_with_peak(451), SAMPLE_RATE, 1.953);
        detector.process(&mut spectrum_with_peak(451), SAMPLE_RATE, 1.953);
        assert_eq!(detector.state().pitch_hold_counter, 1);

        detector.process(&mut spectrum_with_peak(600), SAMPLE_RATE, 1.953);
        assert_eq!(detector.state().pitch_hold_counter, 0);
    }

    #[test]
    fn invalid_cycles_never_give_feedback() {
        let mut detector = detector();
        for _ in 0..6 {
            let mut mag = vec![f32::NEG_INFINITY; SPECTRUM_LEN];
            detector.process(&mut mag, SAMPLE_RATE, 1.953);
        }
        assert!(detector.sink().results.iter().all(|r| r.feedback.is_none()));
    }

    #[test]
    fn silent_cycle_breaks_a_held_pitch() {
        let mut detector = detector();
        detector.process(&mut spectrum_with_peak(451), SAMPLE_RATE, 1.953);
        detector.process(&mut spectrum_with_peak(451), SAMPLE_RATE, 1.953);
        assert_eq!(detector.state().pitch_hold_counter, 1);

        let mut silence = vec![f32::NEG_INFINITY; SPECTRUM_LEN];
        detector.process(&mut silence, SAMPLE_RATE, 1.953);
        assert_eq!(detector.state().pitch_hold_counter, 0);
        assert_eq!(detector.state().last_detected_frequency, Some(0.0));

        // The silent cycle becomes the reference, so the pitch starts over.
        detector.process(&mut spectrum_with_peak(451), SAMPLE_RATE, 1.953);
        assert_eq!(detector.state().pitch_hold_counter, 0);
        detector.process(&mut spectrum_with_peak(451), SAMPLE_RATE, 1.953);
        assert_eq!(detector.state().pitch_hold_counter, 1);
    }

    #[test]
    fn sink_sees_the_previous_result() {
        let mut detector = detector();
        detector.process(&mut spectrum_with_peak(451), SAMPLE_RATE, 1.953);
        detector.process(&mut spectrum_with_peak(600), SAMPLE_RATE, 1.953);

        let sink = detector.sink();
        assert!(sink.previous[0].is_none());
        assert_eq!(sink.previous[1].as_ref(), Some(&sink.results[0]));
        assert_eq!(detector.state().last_target_frequency, Some(sink.results[1].target_frequency));
    }

    #[test]
    fn haptics_follow_the_vibrate_flag() {
        let haptics = SharedHaptics::default();
        let mut detector = detector().with_haptics(haptics.clone());

        for _ in 0..4 {
            detector.process(&mut spectrum_with_peak(451), SAMPLE_RATE, 1.953);
        }
        assert!(haptics.0.lock().unwrap().is_empty(), "vibration is off by default");
        assert!(detector.sink().results[3].feedback.is_some());

        detector.set_vibrate(true);
        for _ in 0..3 {
            detector.process(&mut spectrum_with_peak(451), SAMPLE_RATE, 1.953);
        }
        assert_eq!(*haptics.0.lock().unwrap(), vec![crate::TUNED_PATTERN.to_vec()]);
    }

    #[test]
    fn flat_string_asks_to_tune_up() {
        let mut detector = detector();
        // Bin 440 is 107.4 Hz, below the tolerance band of A2.
        for _ in 0..4 {
            detector.process(&mut spectrum_with_peak(440), SAMPLE_RATE, 1.953);
        }
        let result = detector.last_result().unwrap();
        assert_eq!(result.target_pitch_index, 12);
        assert!(!result.tuned);
        assert!(matches!(result.feedback, Some(TuningFeedback::TuneUp { .. })));
        assert!(result.cents().unwrap() < 0.0);
    }
}
