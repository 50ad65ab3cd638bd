//! # Fast Fourier Transform (FFT) Module
//!
//! FFT-based autocorrelation for the bundled pitch detector.
//!
//! ## Features
//! - High-performance FFT using RustFFT
//! - DC offset removal before analysis
//! - Plans cached per frame size, so a tick never re-plans

use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::sync::Arc;

/// Removes the DC offset from a signal by making its average value zero.
///
/// DC offset can cause issues in frequency analysis by introducing
/// a large component at 0 Hz. This function centers the signal
/// around zero for more accurate analysis.
///
/// # Arguments
/// * `signal` - Audio signal to process (modified in-place)
pub fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 {
        return;
    }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Computes linear (non-circular) autocorrelation through the
/// Wiener-Khinchin theorem: `r(τ) = IFFT(|FFT(x)|²)`.
///
/// The signal is zero-padded to at least twice its length so the circular
/// correlation computed by the FFT does not wrap around.
pub struct Autocorrelator {
    frame_size: usize,
    fft_size: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl Autocorrelator {
    /// Plans the transforms for frames of `frame_size` samples.
    pub fn new(frame_size: usize) -> Self {
        let fft_size = (frame_size * 2).next_power_of_two();
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);
        Self {
            frame_size,
            fft_size,
            forward,
            inverse,
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Writes `r(0)..r(n-1)` for `signal` into `output`.
    ///
    /// # Arguments
    /// * `signal` - Input frame, exactly `frame_size` samples
    /// * `output` - Destination, at least `frame_size` long
    pub fn process(&mut self, signal: &[f32], output: &mut [f32]) {
        debug_assert_eq!(signal.len(), self.frame_size);

        for (slot, &sample) in self.scratch.iter_mut().zip(signal.iter()) {
            *slot = Complex::new(sample, 0.0);
        }
        for slot in self.scratch[signal.len()..].iter_mut() {
            *slot = Complex::new(0.0, 0.0);
        }

        self.forward.process(&mut self.scratch);
        for bin in self.scratch.iter_mut() {
            *bin = Complex::new(bin.norm_sqr(), 0.0);
        }
        self.inverse.process(&mut self.scratch);

        // RustFFT does not normalise the inverse transform.
        let scale = 1.0 / self.fft_size as f32;
        for (out, bin) in output.iter_mut().zip(self.scratch.iter()).take(self.frame_size) {
            *out = bin.re * scale;
        }
    }
}
