//! # Audio Capture Module
//!
//! This module defines the [`CaptureSource`] boundary of the capture loop and
//! its default implementation on top of CPAL (Cross-Platform Audio Library).
//!
//! ## Features
//! - Default input device selection
//! - Mono 16-bit frames at the configured sample rate (no rate negotiation)
//! - Downmixing of multi-channel devices to their first channel
//! - Blocking, exact-length reads fed by the realtime callback through a
//!   bounded queue that drops audio while the reader is behind

use std::collections::VecDeque;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SupportedStreamConfigRange};
use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::error::{Result, TunerError};

/// Device callback chunks buffered ahead of the reader. Once the reader falls
/// this far behind, new chunks are dropped until it catches up.
const QUEUED_CHUNKS: usize = 32;

/// A device that delivers mono 16-bit PCM samples.
pub trait CaptureSource {
    /// Prepares the device for reading at `sample_rate` Hz.
    fn open(&mut self, sample_rate: u32) -> Result<()>;

    /// Fills `buffer` completely, blocking as long as needed.
    ///
    /// # Returns
    /// * The number of samples written. Anything below `buffer.len()` is a short read.
    fn read(&mut self, buffer: &mut [i16]) -> usize;

    /// Releases the device. Called once after the capture loop leaves its cycle.
    fn close(&mut self);
}

/// Microphone input through the default CPAL host.
///
/// The stream is created in [`CaptureSource::open`] and must be read on the
/// thread that opened it.
#[derive(Default)]
pub struct CpalCaptureSource {
    stream: Option<cpal::Stream>,
    receiver: Option<Receiver<Vec<i16>>>,
    pending: VecDeque<i16>,
}

impl CpalCaptureSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CaptureSource for CpalCaptureSource {
    fn open(&mut self, sample_rate: u32) -> Result<()> {
        let (sender, receiver) = crossbeam_channel::bounded(QUEUED_CHUNKS);
        let stream = start_input_stream(sample_rate, sender)?;
        self.stream = Some(stream);
        self.receiver = Some(receiver);
        self.pending.clear();
        Ok(())
    }

    fn read(&mut self, buffer: &mut [i16]) -> usize {
        let Some(receiver) = &self.receiver else {
            return 0;
        };

        while self.pending.len() < buffer.len() {
            match receiver.recv() {
                Ok(chunk) => self.pending.extend(chunk),
                Err(_) => {
                    log::error!("Audio stream closed while reading");
                    break;
                }
            }
        }

        let count = self.pending.len().min(buffer.len());
        for (slot, sample) in buffer.iter_mut().zip(self.pending.drain(..count)) {
            *slot = sample;
        }
        count
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::warn!("Error pausing audio stream: {}", e);
            }
        }
        self.receiver = None;
        self.pending.clear();
        log::info!("Audio capture released");
    }
}

/// Opens the default input device and starts streaming 16-bit mono chunks.
///
/// # Arguments
/// * `sample_rate` - Requested sample rate in Hz; must be supported as-is
/// * `sender` - Channel receiving one chunk per device callback
fn start_input_stream(sample_rate: u32, sender: Sender<Vec<i16>>) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| TunerError::DeviceInit("no input device available".into()))?;

    let device_name = device.name().unwrap_or_else(|_| "Unknown".into());
    log::info!("Using audio input device: {}", device_name);

    let configs = device
        .supported_input_configs()
        .map_err(|e| TunerError::DeviceInit(e.to_string()))?
        .collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, sample_rate).ok_or_else(|| {
        TunerError::DeviceInit(format!(
            "{device_name} has no i16 or f32 input format at {sample_rate} Hz"
        ))
    })?;

    let sample_format = supported_config.sample_format();
    let config: cpal::StreamConfig = supported_config
        .with_sample_rate(cpal::SampleRate(sample_rate))
        .into();
    let channels = config.channels as usize;

    log::info!(
        "Audio config: {:?} @ {}Hz, Channels: {}",
        sample_format,
        config.sample_rate.0,
        channels
    );

    let err_fn = |err| log::error!("An error occurred on the audio stream: {}", err);

    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let mono = data.iter().step_by(channels).copied().collect();
                queue_chunk(&sender, mono);
            },
            err_fn,
            None,
        ),
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mono = data
                    .iter()
                    .step_by(channels)
                    .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                    .collect();
                queue_chunk(&sender, mono);
            },
            err_fn,
            None,
        ),
        other => {
            return Err(TunerError::DeviceInit(format!(
                "unsupported sample format {other:?}"
            )));
        }
    }
    .map_err(|e| TunerError::DeviceInit(e.to_string()))?;

    stream
        .play()
        .map_err(|e| TunerError::DeviceInit(e.to_string()))?;

    Ok(stream)
}

/// Hands one callback chunk to the reader without blocking the audio thread.
///
/// # Returns
/// * Whether the chunk was queued
fn queue_chunk(sender: &Sender<Vec<i16>>, chunk: Vec<i16>) -> bool {
    match sender.try_send(chunk) {
        Ok(()) => true,
        Err(TrySendError::Full(chunk)) => {
            log::debug!("Capture queue full, dropping {} samples", chunk.len());
            false
        }
        // The reader going away ends the run.
        Err(TrySendError::Disconnected(_)) => false,
    }
}

/// Picks the configuration to open the device with.
///
/// Only ranges that contain `target_rate` and deliver i16 or f32 samples are
/// considered. Among those, fewer channels win and i16 beats f32.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| matches!(c.sample_format(), SampleFormat::I16 | SampleFormat::F32))
        .filter(|c| c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0)
        .min_by_key(|c| (c.channels(), c.sample_format() != SampleFormat::I16))
}
