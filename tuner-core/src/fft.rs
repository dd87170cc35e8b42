//! # Fast Fourier Transform (FFT) Module
//!
//! The capture loop hands its zero-padded sample buffers to a
//! [`SpectrumTransform`], which windows and transforms them in place. The
//! default implementation, [`RustFftTransform`], uses RustFFT with a Hann window.
//!
//! Real and imaginary parts travel as two separate `f32` slices so that other
//! transform implementations can be plugged in without a complex number type.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Windowing and forward transform applied in place to an `N`-point signal.
pub trait SpectrumTransform {
    /// Applies the window function to both buffers.
    fn apply_window(&mut self, real: &mut [f32], imag: &mut [f32]);

    /// Replaces the buffers with the forward DFT of `real + i·imag`.
    fn transform(&mut self, real: &mut [f32], imag: &mut [f32]);
}

/// Hann-windowed forward FFT backed by RustFFT.
///
/// The plan, window coefficients and working buffers are allocated once in
/// [`RustFftTransform::new`] and reused every cycle.
pub struct RustFftTransform {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl RustFftTransform {
    /// # Arguments
    /// * `fft_size` - Transform length `N`; both slices passed later must have this length
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];
        Self {
            fft,
            window: hann_window(fft_size),
            buffer: vec![Complex::default(); fft_size],
            scratch,
        }
    }
}

impl SpectrumTransform for RustFftTransform {
    fn apply_window(&mut self, real: &mut [f32], imag: &mut [f32]) {
        for ((re, im), w) in real.iter_mut().zip(imag.iter_mut()).zip(&self.window) {
            *re *= w;
            *im *= w;
        }
    }

    /// # Panics
    /// * If either slice is not exactly `fft_size` long
    fn transform(&mut self, real: &mut [f32], imag: &mut [f32]) {
        assert_eq!(real.len(), self.buffer.len(), "real buffer must match the FFT size");
        assert_eq!(imag.len(), self.buffer.len(), "imaginary buffer must match the FFT size");

        for (c, (&re, &im)) in self.buffer.iter_mut().zip(real.iter().zip(imag.iter())) {
            *c = Complex { re, im };
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        for (c, (re, im)) in self.buffer.iter().zip(real.iter_mut().zip(imag.iter_mut())) {
            *re = c.re;
            *im = c.im;
        }
    }
}

/// Hann window coefficients for `n` points.
fn hann_window(n: usize) -> Vec<f32> {
    if n < 2 {
        return vec![1.0; n];
    }
    let n_minus_1 = (n - 1) as f32;
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos()))
        .collect()
}

/// Fills `out` with the base-10 log magnitude of the first `out.len()` bins.
///
/// Both parts are divided by `fft_size` before the magnitude is taken, so a
/// full-scale sine lands near `log10(0.5)` before windowing. Empty bins become
/// negative infinity.
pub fn log_magnitudes(real: &[f32], imag: &[f32], fft_size: usize, out: &mut [f32]) {
    let scale = fft_size as f32;
    for ((m, &re), &im) in out.iter_mut().zip(real).zip(imag) {
        let real_power = (re / scale) * (re / scale);
        let imag_power = (im / scale) * (im / scale);
        *m = (real_power + imag_power).sqrt().log10();
    }
}
