//! Engine configuration.
//!
//! Every field has a default, so a config file only needs to name what it
//! changes:
//!
//! ```json
//! {
//!     "clarity_threshold": 0.9,
//!     "tuning": "ukulele",
//!     "custom_tunings": [
//!         { "name": "ukulele", "strings": [
//!             { "string_number": 4, "name": "G", "target_midi": 67 },
//!             { "string_number": 3, "name": "C", "target_midi": 60 },
//!             { "string_number": 2, "name": "E", "target_midi": 64 },
//!             { "string_number": 1, "name": "A", "target_midi": 69 }
//!         ] }
//!     ]
//! }
//! ```

use crate::audio::DEFAULT_SAMPLE_RATE;
use crate::engine::DEFAULT_CLARITY_THRESHOLD;
use crate::error::ConfigError;
use crate::history::{DEFAULT_HISTORY_CAPACITY, DEFAULT_WINDOW_SEMITONES};
use crate::monitor::MONITOR_FRAME_SIZE;
use crate::tuner::{DEFAULT_IN_TUNE_CENTS, TUNER_FRAME_SIZE};
use crate::tuning::{self, Tuning};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Smallest analysis frame accepted.
const MIN_FRAME_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Clarity a reading must exceed to count as a detection.
    pub clarity_threshold: f32,
    pub tuner_frame_size: usize,
    pub monitor_frame_size: usize,
    /// Readings kept by the monitor.
    pub history_capacity: usize,
    /// Height of the monitor's visible window.
    pub window_semitones: f32,
    /// Name of the active tuning (custom tunings shadow built-in ones).
    pub tuning: String,
    pub custom_tunings: Vec<Tuning>,
    pub in_tune_cents: f32,
    /// If set, the tuner ignores strings further away than this.
    pub snap_range_semitones: Option<f32>,
    /// Preferred capture sample rate in Hz.
    pub sample_rate: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            clarity_threshold: DEFAULT_CLARITY_THRESHOLD,
            tuner_frame_size: TUNER_FRAME_SIZE,
            monitor_frame_size: MONITOR_FRAME_SIZE,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            window_semitones: DEFAULT_WINDOW_SEMITONES,
            tuning: "standard".to_string(),
            custom_tunings: Vec::new(),
            in_tune_cents: DEFAULT_IN_TUNE_CENTS,
            snap_range_semitones: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl EngineConfig {
    /// Loads and validates a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.clarity_threshold) {
            return Err(invalid("clarity_threshold", "must be in [0, 1)"));
        }
        for (field, size) in [
            ("tuner_frame_size", self.tuner_frame_size),
            ("monitor_frame_size", self.monitor_frame_size),
        ] {
            if size < MIN_FRAME_SIZE {
                return Err(invalid(field, format!("must be at least {MIN_FRAME_SIZE}")));
            }
        }
        if self.history_capacity == 0 {
            return Err(invalid("history_capacity", "must be positive"));
        }
        if !(self.window_semitones > 0.0) {
            return Err(invalid("window_semitones", "must be positive"));
        }
        if self.in_tune_cents < 0.0 {
            return Err(invalid("in_tune_cents", "must not be negative"));
        }
        if self.sample_rate == 0 {
            return Err(invalid("sample_rate", "must be positive"));
        }
        self.resolve_tuning().map(|_| ())
    }

    /// The tuning named by `tuning`, custom tunings first.
    pub fn resolve_tuning(&self) -> Result<Tuning, ConfigError> {
        self.custom_tunings
            .iter()
            .find(|t| t.name() == self.tuning)
            .or_else(|| tuning::by_name(&self.tuning))
            .cloned()
            .ok_or_else(|| ConfigError::UnknownTuning(self.tuning.clone()))
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}
