//! Sine test-tone capture backend.
//!
//! Stands in for a microphone: every frame read advances the tone by one
//! display refresh worth of samples, the way a live rolling buffer would.

use crate::audio::DEFAULT_SAMPLE_RATE;
use crate::error::CaptureError;
use crate::session::{AnalysisNode, CaptureBackend};
use std::f64::consts::TAU;

/// Refresh rate the tone advances at.
const REFRESH_HZ: u32 = 60;

#[derive(Debug, Clone)]
pub struct ToneBackend {
    frequency: f32,
    amplitude: f32,
    sample_rate: u32,
}

impl ToneBackend {
    pub fn new(frequency: f32) -> Self {
        Self {
            frequency,
            amplitude: 0.5,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Retunes the tone; takes effect on the next session.
    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = frequency;
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }
}

/// Marker for an open tone "stream".
#[derive(Debug)]
pub struct ToneStream {
    frequency: f32,
    amplitude: f32,
    sample_rate: u32,
}

#[derive(Debug)]
pub struct ToneNode {
    frequency: f64,
    amplitude: f32,
    sample_rate: u32,
    hop: u64,
    position: u64,
}

impl CaptureBackend for ToneBackend {
    type Stream = ToneStream;
    type Node = ToneNode;

    fn request_stream(&mut self) -> Result<ToneStream, CaptureError> {
        if self.sample_rate == 0 {
            return Err(CaptureError::DeviceUnavailable("sample rate must be positive".into()));
        }
        Ok(ToneStream {
            frequency: self.frequency,
            amplitude: self.amplitude,
            sample_rate: self.sample_rate,
        })
    }

    fn create_analysis_node(
        &mut self,
        stream: &ToneStream,
        _frame_size: usize,
    ) -> Result<ToneNode, CaptureError> {
        Ok(ToneNode {
            frequency: stream.frequency as f64,
            amplitude: stream.amplitude,
            sample_rate: stream.sample_rate,
            hop: (stream.sample_rate / REFRESH_HZ).max(1) as u64,
            position: 0,
        })
    }
}

impl AnalysisNode for ToneNode {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_time_domain(&mut self, buffer: &mut [f32]) -> Result<(), CaptureError> {
        let step = TAU * self.frequency / self.sample_rate as f64;
        for (i, sample) in buffer.iter_mut().enumerate() {
            let phase = step * (self.position + i as u64) as f64;
            *sample = self.amplitude * phase.sin() as f32;
        }
        self.position += self.hop;
        Ok(())
    }
}
