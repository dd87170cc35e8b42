//! # Musical Tuning Module
//!
//! Equal temperament pitch math for the tuner. Pitches are addressed by an
//! index counted in semitones from A1, which sits three octaves below the
//! concert pitch (55 Hz when A4 = 440 Hz). Index 0 is A1, index 12 is A2.
//!
//! ## Features
//! - Frequency to pitch index conversions and back
//! - Tolerance band around every target pitch
//! - Pitch names ("a1", "c#3", ...)
//! - Cent deviation calculations

/// Pitch letters in index order, starting at A.
const PITCH_LETTERS: [&str; 12] = [
    "a", "a#", "b", "c", "c#", "d", "d#", "e", "f", "f#", "g", "g#",
];

/// Share of a semitone on either side of a target that still counts as in tune.
pub const TOLERANCE: f32 = 0.05;

/// 12-tone equal temperament anchored on a concert pitch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EqualTemperament {
    concert_pitch: f32,
}

impl Default for EqualTemperament {
    fn default() -> Self {
        Self::new(440.0)
    }
}

impl EqualTemperament {
    /// # Arguments
    /// * `concert_pitch` - Frequency of A4 in Hz
    pub fn new(concert_pitch: f32) -> Self {
        Self { concert_pitch }
    }

    /// Frequency of pitch index 0 (A1).
    pub fn reference(&self) -> f32 {
        self.concert_pitch / 8.0
    }

    /// Finds the index of the pitch closest to a frequency.
    ///
    /// Frequencies of zero or below map to `i32::MIN`, which is never a valid
    /// target (the cast saturates).
    ///
    /// # Arguments
    /// * `frequency` - Input frequency in Hz
    ///
    /// # Returns
    /// * Semitones from A1, rounded to the nearest pitch
    pub fn pitch_index(&self, frequency: f32) -> i32 {
        (12.0 * (frequency / self.reference()).log2()).round() as i32
    }

    /// Frequency of a pitch index in Hz.
    pub fn frequency(&self, index: i32) -> f32 {
        self.reference() * 2.0_f32.powf(index as f32 / 12.0)
    }

    /// Lowest frequency still considered in tune for `index`.
    pub fn lower_bound(&self, index: i32) -> f32 {
        let frequency = self.frequency(index);
        let next_lower = self.frequency(index.saturating_sub(1));
        frequency - TOLERANCE * (frequency - next_lower)
    }

    /// Highest frequency still considered in tune for `index`.
    pub fn upper_bound(&self, index: i32) -> f32 {
        let frequency = self.frequency(index);
        let next_upper = self.frequency(index.saturating_add(1));
        frequency + TOLERANCE * (next_upper - frequency)
    }

    /// Whether `frequency` lies inside the tolerance band of `index`, bounds included.
    pub fn is_within_tolerance(&self, frequency: f32, index: i32) -> bool {
        frequency >= self.lower_bound(index) && frequency <= self.upper_bound(index)
    }
}

/// Names a pitch index, e.g. `0` is `"a1"`, `4` is `"c#2"` and `12` is `"a2"`.
///
/// The octave number changes at C, like scientific pitch notation.
pub fn pitch_name(index: i32) -> String {
    let octave = (index + 9).div_euclid(12) + 1;
    let letter = PITCH_LETTERS[index.rem_euclid(12) as usize];
    format!("{letter}{octave}")
}

/// Calculates the deviation from a target frequency in cents.
///
/// 100 cents make a semitone. Positive values are sharp, negative values flat.
pub fn cents_between(frequency: f32, target_frequency: f32) -> f32 {
    1200.0 * (frequency / target_frequency).log2()
}
