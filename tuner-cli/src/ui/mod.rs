//! # UI Module
//!
//! Terminal output for pitch results.

pub mod cent_meter;

use cent_meter::CentMeter;
use tuner_core::{PitchResult, TuningFeedback};

/// One status line for a result.
pub fn format_result(result: &PitchResult) -> String {
    if !result.valid {
        return format!("  --   {}  no pitch", CentMeter::new(None).render());
    }

    let cents = result.cents();
    let mut line = format!(
        "{:>4}  {}  {:7.2} Hz -> {:7.2} Hz  {:+6.1} cents",
        result.label(),
        CentMeter::new(cents).render(),
        result.detected_frequency,
        result.target_frequency,
        cents.unwrap_or_default()
    );
    if let Some(feedback) = &result.feedback {
        line.push_str("  ");
        line.push_str(&describe_feedback(feedback));
    }
    line
}

pub fn describe_feedback(feedback: &TuningFeedback) -> String {
    match feedback {
        TuningFeedback::TuneUp { by_hz } => format!("TUNE UP ({by_hz:.2} Hz)"),
        TuningFeedback::TuneDown { by_hz } => format!("TUNE DOWN ({by_hz:.2} Hz)"),
        TuningFeedback::Tuned { .. } => "TUNED".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_results_show_no_pitch() {
        let line = format_result(&PitchResult::default());
        assert!(line.contains("no pitch"));
    }

    #[test]
    fn verdict_is_appended() {
        let result = PitchResult {
            detected_frequency: 108.0,
            target_frequency: 110.0,
            target_pitch_index: 12,
            valid: true,
            feedback: Some(TuningFeedback::TuneUp { by_hz: 2.0 }),
            ..PitchResult::default()
        };
        let line = format_result(&result);
        assert!(line.starts_with("  a2"));
        assert!(line.ends_with("TUNE UP (2.00 Hz)"));
    }
}
