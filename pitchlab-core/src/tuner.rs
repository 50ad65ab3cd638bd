//! # Guitar Tuner
//!
//! Snaps every detection to the nearest string of the active tuning and
//! reports how far off that string's target it is.
//!
//! Low-confidence frames leave the last valid reading on display instead of
//! flickering back to "no string".

use crate::config::EngineConfig;
use crate::engine::{AnalysisEngine, Reading, ToolState};
use crate::error::ConfigError;
use crate::note;
use crate::pitch::PitchEstimator;
use crate::session::CaptureBackend;
use crate::tuning::{GuitarString, Tuning};
use tracing::debug;

/// How close to the target a string must be to count as in tune.
pub const DEFAULT_IN_TUNE_CENTS: f32 = 4.0;

/// Analysis frame size used by the tuner.
pub const TUNER_FRAME_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuningStatus {
    Flat,
    InTune,
    Sharp,
}

/// The tuner's current display state.
#[derive(Debug, Clone, PartialEq)]
pub struct TunerReading {
    /// String the detection snapped to.
    pub string: GuitarString,
    /// Deviation from the string's target (positive = sharp).
    pub cents_off: f32,
    /// Name of the note actually played, e.g. "A2".
    pub detected_note: String,
    /// Detected frequency in Hz.
    pub frequency: f32,
}

impl TunerReading {
    pub fn status(&self, in_tune_cents: f32) -> TuningStatus {
        if self.cents_off < -in_tune_cents {
            TuningStatus::Flat
        } else if self.cents_off > in_tune_cents {
            TuningStatus::Sharp
        } else {
            TuningStatus::InTune
        }
    }
}

#[derive(Debug, Clone)]
pub struct TunerState {
    tuning: Tuning,
    in_tune_cents: f32,
    snap_range_semitones: Option<f32>,
    reading: Option<TunerReading>,
}

impl TunerState {
    pub fn new(tuning: Tuning) -> Self {
        Self {
            tuning,
            in_tune_cents: DEFAULT_IN_TUNE_CENTS,
            snap_range_semitones: None,
            reading: None,
        }
    }

    pub fn with_in_tune_cents(mut self, cents: f32) -> Self {
        self.in_tune_cents = cents;
        self
    }

    /// Only snap to strings within `semitones` of the detection.
    pub fn with_snap_range(mut self, semitones: Option<f32>) -> Self {
        self.snap_range_semitones = semitones;
        self
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    /// Switches tuning and clears the reading.
    pub fn set_tuning(&mut self, tuning: Tuning) {
        debug!("Switching tuning to {}", tuning.name());
        self.tuning = tuning;
        self.reading = None;
    }

    pub fn reading(&self) -> Option<&TunerReading> {
        self.reading.as_ref()
    }

    pub fn active_string(&self) -> Option<&GuitarString> {
        self.reading.as_ref().map(|r| &r.string)
    }

    pub fn cents_off(&self) -> Option<f32> {
        self.reading.as_ref().map(|r| r.cents_off)
    }

    pub fn status(&self) -> Option<TuningStatus> {
        self.reading.as_ref().map(|r| r.status(self.in_tune_cents))
    }

    pub fn in_tune_cents(&self) -> f32 {
        self.in_tune_cents
    }
}

impl ToolState for TunerState {
    fn accept(&mut self, reading: &Reading) {
        let &Reading::Pitch { frequency, midi, .. } = reading else {
            // Hold the last valid reading.
            return;
        };

        let string = match self.snap_range_semitones {
            Some(range) => match self.tuning.find_closest_string_within(midi, range) {
                Some(string) => string,
                None => {
                    self.reading = None;
                    return;
                }
            },
            None => self.tuning.find_closest_string(midi),
        };

        self.reading = Some(TunerReading {
            string: string.clone(),
            cents_off: note::cents_off_from_pitch(frequency, string.target_frequency()),
            detected_note: note::midi_to_note_name(midi.round() as i32),
            frequency,
        });
    }

    fn reset(&mut self) {
        self.reading = None;
    }

    fn on_stop(&mut self) {
        self.reading = None;
    }
}

/// The guitar tuner tool.
pub type GuitarTuner<B, E> = AnalysisEngine<B, E, TunerState>;

impl<B: CaptureBackend, E: PitchEstimator> AnalysisEngine<B, E, TunerState> {
    /// Builds a tuner from configuration.
    pub fn new(backend: B, estimator: E, config: &EngineConfig) -> Result<Self, ConfigError> {
        let state = TunerState::new(config.resolve_tuning()?)
            .with_in_tune_cents(config.in_tune_cents)
            .with_snap_range(config.snap_range_semitones);
        Ok(Self::with_state(
            backend,
            estimator,
            state,
            config.tuner_frame_size,
            config.clarity_threshold,
        ))
    }

    pub fn set_tuning(&mut self, tuning: Tuning) {
        self.state_mut().set_tuning(tuning);
    }
}
