//! # Tuner - Terminal Front End
//!
//! Runs the tuner pipeline against the microphone (or a WAV file) and prints
//! one line per result.
//!
//! ## Architecture
//! - **Capture Thread**: owns the capture device and runs the capture loop
//! - **Main Thread**: receives results and renders them
//! - **Input Thread**: waits for Enter and requests a stop
//! - **Communication**: crossbeam channel carrying `PitchResult`s

mod cli;
mod haptics;
mod ui;
mod wav;

use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use crossbeam_channel::{Receiver, Sender};
use tuner_core::audio::{CaptureSource, CpalCaptureSource};
use tuner_core::fft::RustFftTransform;
use tuner_core::sink::ChannelSink;
use tuner_core::{CaptureLoop, PitchDetector, PitchResult, StopHandle, TunerConfig, TunerError};

use cli::Cli;
use haptics::TerminalHaptics;
use wav::WavCaptureSource;

/// Results buffered between the capture thread and the display.
const RESULT_QUEUE: usize = 16;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    if let Some(path) = &cli.write_config {
        config
            .save(path)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        log::info!("Wrote config to {}", path.display());
        return Ok(());
    }

    let (result_tx, result_rx) = crossbeam_channel::bounded(RESULT_QUEUE);
    let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
    let worker = match &cli.wav {
        Some(path) => {
            let path = path.clone();
            // Offline input waits for the display instead of dropping results.
            let sink = ChannelSink::blocking(result_tx);
            spawn_capture(config, sink, stop_tx, move || WavCaptureSource::new(path))?
        }
        None => {
            log::info!("Press Enter to stop");
            let sink = ChannelSink::new(result_tx);
            spawn_capture(config, sink, stop_tx, CpalCaptureSource::new)?
        }
    };

    // No handle means the loop was never built; the thread's result says why.
    if let Ok(stop) = stop_rx.recv() {
        spawn_stop_on_enter(stop);
        display_results(&result_rx, cli.json)?;
    }

    let outcome = worker
        .join()
        .map_err(|_| anyhow!("capture thread panicked"))?;
    match outcome {
        Ok(()) => Ok(()),
        // A WAV file runs out; that is the normal end of an offline run.
        Err(TunerError::ShortRead { .. }) if cli.wav.is_some() => {
            log::info!("Reached the end of the recording");
            Ok(())
        }
        Err(e) => Err(e).context("tuner stopped"),
    }
}

/// Starts the capture loop on its own thread.
///
/// The source is built inside the thread because device streams may not be
/// sent between threads. The loop's stop handle is sent back over `stop_tx`.
fn spawn_capture<C, F>(
    config: TunerConfig,
    sink: ChannelSink,
    stop_tx: Sender<StopHandle>,
    make_source: F,
) -> Result<JoinHandle<Result<(), TunerError>>>
where
    C: CaptureSource,
    F: FnOnce() -> C + Send + 'static,
{
    thread::Builder::new()
        .name("capture".into())
        .spawn(move || -> Result<(), TunerError> {
            log::info!("Starting capture thread...");
            let detector = PitchDetector::new(&config, sink).with_haptics(TerminalHaptics);
            let mut capture = CaptureLoop::new(
                &config,
                make_source(),
                RustFftTransform::new(config.fft_size),
                detector,
            )?;
            let _ = stop_tx.send(capture.stop_handle());
            let outcome = capture.run();
            log::info!("Capture thread finished");
            outcome
        })
        .context("failed to spawn capture thread")
}

/// Stops the tuner when a line is entered on stdin.
fn spawn_stop_on_enter(stop: StopHandle) {
    thread::spawn(move || {
        let mut line = String::new();
        // EOF (closed or redirected stdin) is not a stop request.
        if matches!(std::io::stdin().read_line(&mut line), Ok(n) if n > 0) {
            log::info!("Stop requested");
            stop.stop();
        }
    });
}

/// Prints results until the capture thread finishes and drops its sender.
fn display_results(results: &Receiver<PitchResult>, json: bool) -> Result<()> {
    for result in results.iter() {
        if json {
            println!("{}", serde_json::to_string(&result)?);
        } else {
            println!("{}", ui::format_result(&result));
        }
    }
    Ok(())
}
