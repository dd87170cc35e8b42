use clap::Parser;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tuner_core::TunerConfig;

#[derive(Parser, Debug)]
#[command(name = "tuner", about = "Real-time instrument tuner for the terminal")]
pub struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Capture sample rate in Hz
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Samples read per cycle
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// FFT length (power of two, at least the buffer size)
    #[arg(long)]
    pub fft_size: Option<usize>,

    /// Frequency of A4 in Hz
    #[arg(long)]
    pub concert_pitch: Option<f32>,

    /// Ring the terminal bell on every verdict
    #[arg(long)]
    pub vibrate: bool,

    /// Read a 16-bit mono WAV file instead of the microphone
    #[arg(long)]
    pub wav: Option<PathBuf>,

    /// Print one JSON object per result instead of the meter
    #[arg(long)]
    pub json: bool,

    /// Write the effective configuration to this file and exit
    #[arg(long)]
    pub write_config: Option<PathBuf>,
}

impl Cli {
    /// Loads the config file, if any, and applies command-line overrides on top.
    pub fn resolve_config(&self) -> Result<TunerConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let config = TunerConfig::load(path)
                    .with_context(|| format!("failed to load config from {}", path.display()))?;
                log::info!("Loaded config from {}", path.display());
                config
            }
            None => TunerConfig::default(),
        };

        if let Some(sample_rate) = self.sample_rate {
            config.sample_rate = sample_rate;
        }
        if let Some(buffer_size) = self.buffer_size {
            config.buffer_size = buffer_size;
        }
        if let Some(fft_size) = self.fft_size {
            config.fft_size = fft_size;
        }
        if let Some(concert_pitch) = self.concert_pitch {
            config.concert_pitch = concert_pitch;
        }
        if self.vibrate {
            config.vibrate = true;
        }

        config.validate().context("invalid tuner configuration")?;
        Ok(config)
    }
}
