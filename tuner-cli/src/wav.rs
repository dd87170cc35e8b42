//! Capture source reading recorded audio from a WAV file.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use tuner_core::audio::CaptureSource;
use tuner_core::error::Result;
use tuner_core::TunerError;

type Samples = hound::WavIntoSamples<BufReader<File>, i16>;

/// Plays a 16-bit integer WAV file through the tuner, as fast as it can be read.
///
/// Multi-channel files are reduced to their first channel. The end of the file
/// shows up as a short read, which ends the capture loop.
pub struct WavCaptureSource {
    path: PathBuf,
    samples: Option<Samples>,
    channels: usize,
}

impl WavCaptureSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            samples: None,
            channels: 1,
        }
    }
}

impl CaptureSource for WavCaptureSource {
    fn open(&mut self, sample_rate: u32) -> Result<()> {
        let reader = hound::WavReader::open(&self.path).map_err(|e| {
            TunerError::DeviceInit(format!("cannot open {}: {e}", self.path.display()))
        })?;
        let spec = reader.spec();

        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(TunerError::DeviceInit(format!(
                "{} is not 16-bit PCM ({:?}, {} bits)",
                self.path.display(),
                spec.sample_format,
                spec.bits_per_sample
            )));
        }
        if spec.sample_rate != sample_rate {
            return Err(TunerError::DeviceInit(format!(
                "{} is recorded at {} Hz, expected {} Hz",
                self.path.display(),
                spec.sample_rate,
                sample_rate
            )));
        }

        log::info!(
            "Reading {} ({} Hz, {} channel(s))",
            self.path.display(),
            spec.sample_rate,
            spec.channels
        );
        self.channels = spec.channels.max(1) as usize;
        self.samples = Some(reader.into_samples::<i16>());
        Ok(())
    }

    fn read(&mut self, buffer: &mut [i16]) -> usize {
        let Some(samples) = self.samples.as_mut() else {
            return 0;
        };

        let mut count = 0;
        for slot in buffer.iter_mut() {
            match samples.next() {
                Some(Ok(sample)) => *slot = sample,
                Some(Err(e)) => {
                    log::error!("Error decoding {}: {}", self.path.display(), e);
                    break;
                }
                None => break,
            }
            // Skip the remaining channels of this frame.
            for _ in 1..self.channels {
                let _ = samples.next();
            }
            count += 1;
        }
        count
    }

    fn close(&mut self) {
        self.samples = None;
    }
}
