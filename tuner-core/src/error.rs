//! # Error Module
//!
//! Every condition that ends a capture run is a variant of [`TunerError`].
//! Invalid spectra are not errors: they produce an invalid [`crate::PitchResult`]
//! and the loop keeps going.

use thiserror::Error;

/// Errors returned by the tuner pipeline.
#[derive(Debug, Error)]
pub enum TunerError {
    /// The capture device could not be opened at the requested format.
    #[error("capture device could not be initialized: {0}")]
    DeviceInit(String),

    /// The capture device delivered fewer samples than a full frame.
    #[error("short read from capture device: expected {expected} samples, got {got}")]
    ShortRead {
        /// Samples requested for one frame.
        expected: usize,
        /// Samples actually delivered.
        got: usize,
    },

    /// The result sink rejected too many results in a row.
    #[error("result sink rejected {failures} consecutive results")]
    SinkRejected {
        /// Consecutive rejections at the moment of the abort.
        failures: u32,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TunerError>;
