//! Consumers of pitch results and haptic feedback.

use crossbeam_channel::{Sender, TrySendError};

use crate::PitchResult;

/// Receives one [`PitchResult`] per cycle.
///
/// The call is made on the capture thread and may block, which throttles the
/// capture cadence. Returning `false` tells the capture loop the result could
/// not be used; enough of those in a row stop the loop.
pub trait ResultSink {
    /// # Arguments
    /// * `result` - This cycle's result
    /// * `last` - The previous cycle's result, `None` on the first cycle
    /// * `cycle_rate_hz` - How many cycles complete per second
    fn accept(
        &mut self,
        result: &PitchResult,
        last: Option<&PitchResult>,
        cycle_rate_hz: f32,
    ) -> bool;
}

impl<S: ResultSink + ?Sized> ResultSink for &mut S {
    fn accept(
        &mut self,
        result: &PitchResult,
        last: Option<&PitchResult>,
        cycle_rate_hz: f32,
    ) -> bool {
        (**self).accept(result, last, cycle_rate_hz)
    }
}

impl<S: ResultSink + ?Sized> ResultSink for Box<S> {
    fn accept(
        &mut self,
        result: &PitchResult,
        last: Option<&PitchResult>,
        cycle_rate_hz: f32,
    ) -> bool {
        (**self).accept(result, last, cycle_rate_hz)
    }
}

/// Plays vibration patterns.
///
/// A pattern alternates silence and vibration durations in milliseconds,
/// starting with silence.
pub trait HapticFeedback {
    fn vibrate(&mut self, pattern: &[u64]);
}

/// Forwards results to another thread over a crossbeam channel.
///
/// A dropped receiver counts as a rejected result. A full channel does too,
/// unless the sink was built with [`ChannelSink::blocking`], in which case the
/// capture loop waits for the consumer.
pub struct ChannelSink {
    sender: Sender<PitchResult>,
    block_when_full: bool,
}

impl ChannelSink {
    pub fn new(sender: Sender<PitchResult>) -> Self {
        Self {
            sender,
            block_when_full: false,
        }
    }

    /// A sink that waits for room in the channel instead of dropping results.
    pub fn blocking(sender: Sender<PitchResult>) -> Self {
        Self {
            sender,
            block_when_full: true,
        }
    }
}

impl ResultSink for ChannelSink {
    fn accept(
        &mut self,
        result: &PitchResult,
        _last: Option<&PitchResult>,
        _cycle_rate_hz: f32,
    ) -> bool {
        if self.block_when_full {
            return match self.sender.send(result.clone()) {
                Ok(()) => true,
                Err(_) => {
                    log::debug!("Result receiver is gone");
                    false
                }
            };
        }

        match self.sender.try_send(result.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::debug!("Result channel full, dropping result");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                log::debug!("Result receiver is gone");
                false
            }
        }
    }
}
