use std::io::Write;

use tuner_core::sink::HapticFeedback;

/// Stands in for a vibration motor: one terminal bell per vibrate segment.
pub struct TerminalHaptics;

impl HapticFeedback for TerminalHaptics {
    fn vibrate(&mut self, pattern: &[u64]) {
        log::debug!("Vibrate pattern {:?}", pattern);
        // Odd positions are vibrate segments.
        let pulses = pattern.iter().skip(1).step_by(2).count();
        let mut stderr = std::io::stderr();
        let _ = stderr.write_all("\x07".repeat(pulses).as_bytes());
        let _ = stderr.flush();
    }
}
