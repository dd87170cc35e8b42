//! # Capture Loop Module
//!
//! Drives the read → window → transform → magnitude → detect cycle on the
//! calling thread until it is stopped or has to abort.
//!
//! ## Abort conditions
//! - The capture device cannot be opened
//! - A read returns fewer samples than one frame
//! - The result sink rejects more results in a row than the configured threshold
//!
//! Stopping is cooperative: [`StopHandle::stop`] is observed at the top of the
//! next cycle, so at most one cycle in flight is completed before the device
//! is released.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::audio::CaptureSource;
use crate::config::TunerConfig;
use crate::error::{Result, TunerError};
use crate::fft::{self, SpectrumTransform};
use crate::pitch::PitchDetector;
use crate::sink::ResultSink;

/// Every 16-bit sample value mapped to [-1, 1), indexed by `sample + 32768`.
static SAMPLE_LOOKUP: Lazy<Vec<f32>> =
    Lazy::new(|| (0..65536).map(|i| (i as f32 - 32768.0) / 32768.0).collect());

fn sample_to_float(sample: i16) -> f32 {
    SAMPLE_LOOKUP[(sample as i32 + 32768) as usize]
}

/// Cloneable handle used to request a cooperative stop from another thread.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Working buffers for one run, allocated once when the loop starts.
struct Frames {
    samples: Vec<i16>,
    real: Vec<f32>,
    imag: Vec<f32>,
    mag: Vec<f32>,
}

impl Frames {
    fn new(buffer_size: usize, fft_size: usize) -> Self {
        Self {
            samples: vec![0; buffer_size],
            real: vec![0.0; fft_size],
            imag: vec![0.0; fft_size],
            mag: vec![0.0; fft_size / 2],
        }
    }
}

/// Owns the capture device, the transform and the detector of one tuner instance.
pub struct CaptureLoop<C, T, S> {
    sample_rate: u32,
    buffer_size: usize,
    fft_size: usize,
    max_consecutive_failures: u32,
    source: C,
    transform: T,
    detector: PitchDetector<S>,
    stop: StopHandle,
    failure_count: u32,
    cycles: u64,
}

impl<C, T, S> CaptureLoop<C, T, S>
where
    C: CaptureSource,
    T: SpectrumTransform,
    S: ResultSink,
{
    /// # Arguments
    /// * `config` - Sizes and rates, fixed from here on
    /// * `source` - Device delivering 16-bit mono samples
    /// * `transform` - Window and FFT for `config.fft_size` points
    /// * `detector` - Receives every magnitude spectrum
    ///
    /// # Errors
    /// * [`TunerError::Config`] if `config` fails [`TunerConfig::validate`]
    pub fn new(
        config: &TunerConfig,
        source: C,
        transform: T,
        detector: PitchDetector<S>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            sample_rate: config.sample_rate,
            buffer_size: config.buffer_size,
            fft_size: config.fft_size,
            max_consecutive_failures: config.max_consecutive_failures,
            source,
            transform,
            detector,
            stop: StopHandle::default(),
            failure_count: 0,
            cycles: 0,
        })
    }

    /// Cycles per second, `sample_rate / buffer_size`.
    pub fn cycle_rate(&self) -> f32 {
        self.sample_rate as f32 / self.buffer_size as f32
    }

    /// Runs cycles until stopped or aborted.
    ///
    /// # Returns
    /// * `Ok(())` - A stop was requested
    /// * `Err(e)` - The loop aborted; the device has been released if it was opened
    pub fn run(&mut self) -> Result<()> {
        let mut frames = Frames::new(self.buffer_size, self.fft_size);

        if let Err(e) = self.source.open(self.sample_rate) {
            log::error!("Capture device failed to initialize: {}", e);
            return Err(e);
        }
        log::info!(
            "Capture loop started: {} Hz, buffer {} samples, FFT {} points ({:.3} cycles/s)",
            self.sample_rate,
            self.buffer_size,
            self.fft_size,
            self.cycle_rate()
        );

        let outcome = self.cycle_until_stopped(&mut frames);
        self.source.close();

        match &outcome {
            Ok(()) => log::info!("Capture loop stopped after {} cycles", self.cycles),
            Err(e) => log::warn!("Capture loop aborted after {} cycles: {}", self.cycles, e),
        }
        outcome
    }

    fn cycle_until_stopped(&mut self, frames: &mut Frames) -> Result<()> {
        while !self.stop.is_stopped() {
            self.cycle(frames)?;
        }
        Ok(())
    }

    fn cycle(&mut self, frames: &mut Frames) -> Result<()> {
        let got = self.source.read(&mut frames.samples);
        if got != self.buffer_size {
            return Err(TunerError::ShortRead {
                expected: self.buffer_size,
                got,
            });
        }
        log::trace!("Samples: {:?} ...", &frames.samples[..frames.samples.len().min(3)]);

        for (re, &sample) in frames.real.iter_mut().zip(&frames.samples) {
            *re = sample_to_float(sample);
        }
        frames.real[self.buffer_size..].fill(0.0);
        frames.imag.fill(0.0);

        self.transform.apply_window(&mut frames.real, &mut frames.imag);
        self.transform.transform(&mut frames.real, &mut frames.imag);
        fft::log_magnitudes(&frames.real, &frames.imag, self.fft_size, &mut frames.mag);

        let cycle_rate = self.cycle_rate();
        let accepted = self.detector.process(&mut frames.mag, self.sample_rate, cycle_rate);
        self.cycles += 1;

        if accepted {
            self.failure_count = 0;
        } else {
            self.failure_count += 1;
            log::debug!("Result rejected by sink ({} in a row)", self.failure_count);
        }

        if self.failure_count > self.max_consecutive_failures {
            return Err(TunerError::SinkRejected {
                failures: self.failure_count,
            });
        }
        Ok(())
    }
}

impl<C, T, S> CaptureLoop<C, T, S> {
    /// Handle that stops this loop; clone it before moving the loop to its thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Consecutive results the sink rejected.
    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Cycles completed since construction.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn detector(&self) -> &PitchDetector<S> {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut PitchDetector<S> {
        &mut self.detector
    }

    pub fn source(&self) -> &C {
        &self.source
    }
}
