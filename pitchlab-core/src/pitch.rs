//! # Pitch Detection Module
//!
//! The engine treats pitch estimation as a black box behind the
//! [`PitchEstimator`] trait: a frame of samples goes in, a frequency and a
//! clarity score come out. The confidence policy is applied by the engine,
//! never by the estimator.
//!
//! [`McLeodDetector`] is the bundled implementation. It follows the McLeod
//! Pitch Method (normalised square difference function with key-maximum
//! picking) and computes the autocorrelation through [`crate::fft`].
//!
//! ## Features
//! - NSDF clarity score in [0, 1]
//! - Octave error prevention through key-maximum cutoff
//! - Parabolic interpolation for sub-sample accuracy
//! - Amplitude gating to filter out silence

use crate::fft::{Autocorrelator, remove_dc_offset};

/// One tick's estimator output.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PitchSample {
    /// Detected frequency in Hz (0.0 when nothing was found).
    pub frequency: f32,
    /// How tonal/periodic the frame is, 0.0 to 1.0.
    pub clarity: f32,
}

impl PitchSample {
    /// "Nothing detected".
    pub const NONE: PitchSample = PitchSample {
        frequency: 0.0,
        clarity: 0.0,
    };

    /// Creates a sample, clamping clarity into [0, 1].
    pub fn new(frequency: f32, clarity: f32) -> Self {
        let clarity = if clarity.is_nan() { 0.0 } else { clarity.clamp(0.0, 1.0) };
        Self { frequency, clarity }
    }

    /// Whether this sample passes a confidence gate.
    ///
    /// A sample is valid only if its clarity is strictly above `threshold`
    /// and its frequency is a positive, finite number.
    pub fn passes_gate(&self, threshold: f32) -> bool {
        self.clarity > threshold && self.frequency > 0.0 && self.frequency.is_finite()
    }
}

/// Contract of the pitch estimation collaborator.
pub trait PitchEstimator {
    /// Estimates the fundamental of `frame`, sampled at `sample_rate` Hz.
    fn estimate(&mut self, frame: &[f32], sample_rate: u32) -> PitchSample;
}

impl<E: PitchEstimator + ?Sized> PitchEstimator for Box<E> {
    fn estimate(&mut self, frame: &[f32], sample_rate: u32) -> PitchSample {
        (**self).estimate(frame, sample_rate)
    }
}

/// Fraction of the highest key maximum a peak must reach to be picked.
const DEFAULT_CUTOFF: f32 = 0.97;

/// RMS below which a frame is treated as silence.
const DEFAULT_MIN_RMS: f32 = 1e-4;

/// McLeod Pitch Method detector.
pub struct McLeodDetector {
    correlator: Autocorrelator,
    work: Vec<f32>,
    acf: Vec<f32>,
    nsdf: Vec<f32>,
    cutoff: f32,
    min_rms: f32,
}

impl McLeodDetector {
    /// Creates a detector for frames of `frame_size` samples.
    pub fn new(frame_size: usize) -> Self {
        Self {
            correlator: Autocorrelator::new(frame_size),
            work: vec![0.0; frame_size],
            acf: vec![0.0; frame_size],
            nsdf: vec![0.0; frame_size / 2],
            cutoff: DEFAULT_CUTOFF,
            min_rms: DEFAULT_MIN_RMS,
        }
    }

    /// Overrides the key-maximum cutoff (0.8 - 1.0 is sensible).
    pub fn with_cutoff(mut self, cutoff: f32) -> Self {
        self.cutoff = cutoff;
        self
    }

    /// Overrides the silence gate.
    pub fn with_min_rms(mut self, min_rms: f32) -> Self {
        self.min_rms = min_rms;
        self
    }

    fn normalized_square_difference(&mut self) {
        let n = self.work.len();
        let max_lag = self.nsdf.len();

        // m'(τ) = Σ (x_j² + x_{j+τ}²), shrunk incrementally as τ grows.
        let mut m = 2.0 * self.acf[0];
        for tau in 0..max_lag {
            self.nsdf[tau] = if m > 0.0 { 2.0 * self.acf[tau] / m } else { 0.0 };
            let head = self.work[tau];
            let tail = self.work[n - 1 - tau];
            m -= head * head + tail * tail;
        }
    }

    /// Finds the highest point of every positive lobe after the first
    /// negative-going zero crossing.
    fn key_maxima(&self) -> Vec<usize> {
        let nsdf = &self.nsdf;
        let len = nsdf.len();
        let mut maxima = Vec::new();

        let mut pos = 0;
        while pos < len && nsdf[pos] > 0.0 {
            pos += 1;
        }

        while pos < len {
            while pos < len && nsdf[pos] <= 0.0 {
                pos += 1;
            }
            let mut best: Option<usize> = None;
            while pos < len && nsdf[pos] > 0.0 {
                if best.is_none_or(|b| nsdf[pos] > nsdf[b]) {
                    best = Some(pos);
                }
                pos += 1;
            }
            if let Some(b) = best {
                maxima.push(b);
            }
        }
        maxima
    }

    /// Parabolic interpolation around `index`: returns (refined lag, peak value).
    fn interpolate(&self, index: usize) -> (f32, f32) {
        if index == 0 || index + 1 >= self.nsdf.len() {
            return (index as f32, self.nsdf[index]);
        }
        let a = self.nsdf[index - 1];
        let b = self.nsdf[index];
        let c = self.nsdf[index + 1];
        let denominator = a - 2.0 * b + c;
        if denominator.abs() < 1e-12 {
            return (index as f32, b);
        }
        let shift = 0.5 * (a - c) / denominator;
        (index as f32 + shift, b - 0.25 * (a - c) * shift)
    }
}

impl PitchEstimator for McLeodDetector {
    fn estimate(&mut self, frame: &[f32], sample_rate: u32) -> PitchSample {
        if frame.len() < 4 {
            return PitchSample::NONE;
        }
        if frame.len() != self.correlator.frame_size() {
            *self = McLeodDetector::new(frame.len())
                .with_cutoff(self.cutoff)
                .with_min_rms(self.min_rms);
        }

        self.work.copy_from_slice(frame);
        remove_dc_offset(&mut self.work);

        // --- Noise Gate: Calculate RMS to filter out silence ---
        let rms = (self.work.iter().map(|&s| s * s).sum::<f32>() / frame.len() as f32).sqrt();
        if rms < self.min_rms {
            return PitchSample::NONE;
        }

        self.correlator.process(&self.work, &mut self.acf);
        self.normalized_square_difference();

        let maxima = self.key_maxima();
        let Some(highest) = maxima
            .iter()
            .map(|&i| self.nsdf[i])
            .max_by(|a, b| a.total_cmp(b))
        else {
            return PitchSample::NONE;
        };

        let threshold = self.cutoff * highest;
        let Some(&chosen) = maxima.iter().find(|&&i| self.nsdf[i] >= threshold) else {
            return PitchSample::NONE;
        };

        let (lag, clarity) = self.interpolate(chosen);
        if lag <= 0.0 {
            return PitchSample::NONE;
        }
        let frequency = sample_rate as f32 / lag;
        if frequency.is_finite() && frequency > 0.0 {
            PitchSample::new(frequency, clarity)
        } else {
            PitchSample::NONE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate_sine(sample_rate: u32, freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                0.5 * (2.0 * std::f32::consts::PI * freq * t).sin()
            })
            .collect()
    }

    #[test]
    fn detects_low_a() {
        let samples = generate_sine(44100, 110.0, 4096);
        let mut detector = McLeodDetector::new(4096);
        let result = detector.estimate(&samples, 44100);

        assert!((result.frequency - 110.0).abs() < 1.0, "got {} Hz", result.frequency);
        assert!(result.clarity > 0.95, "clarity {}", result.clarity);
    }

    #[test]
    fn detects_various_frequencies() {
        let mut detector = McLeodDetector::new(2048);
        for &freq in &[82.41_f32, 196.0, 440.0, 880.0] {
            let samples = generate_sine(48000, freq, 2048);
            let result = detector.estimate(&samples, 48000);
            let cents = 1200.0 * (result.frequency / freq).log2();
            assert!(cents.abs() < 10.0, "expected ~{freq} Hz, got {} Hz", result.frequency);
        }
    }

    #[test]
    fn silence_has_no_pitch() {
        let mut detector = McLeodDetector::new(1024);
        let result = detector.estimate(&vec![0.0; 1024], 44100);
        assert_eq!(result, PitchSample::NONE);
    }

    #[test]
    fn adapts_to_new_frame_size() {
        let mut detector = McLeodDetector::new(1024);
        let samples = generate_sine(44100, 220.0, 4096);
        let result = detector.estimate(&samples, 44100);
        assert!((result.frequency - 220.0).abs() < 2.0);
    }

    #[test]
    fn gate_rejects_low_clarity_and_bad_frequency() {
        assert!(PitchSample::new(110.0, 0.99).passes_gate(0.95));
        assert!(!PitchSample::new(110.0, 0.5).passes_gate(0.95));
        assert!(!PitchSample::new(110.0, 0.95).passes_gate(0.95));
        assert!(!PitchSample::new(0.0, 1.0).passes_gate(0.95));
        assert!(!PitchSample::new(-5.0, 1.0).passes_gate(0.95));
        assert_eq!(PitchSample::new(100.0, 1.7).clarity, 1.0);
    }
}
