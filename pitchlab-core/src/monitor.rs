//! # Pitch Monitor
//!
//! Follows the pitch over time: every tick lands in a [`PitchHistory`] and
//! the visible window follows the singer. Pausing freezes the loop and
//! produces a one-shot analysis of the last valid reading.

use crate::config::EngineConfig;
use crate::engine::{AnalysisEngine, Reading, ToolState};
use crate::error::SessionError;
use crate::history::{PausedAnalysis, PitchHistory, VisibleRange};
use crate::note;
use crate::pitch::PitchEstimator;
use crate::session::{CaptureBackend, SessionState};
use tracing::debug;

/// Analysis frame size used by the monitor.
pub const MONITOR_FRAME_SIZE: usize = 2048;

/// The monitor's live note display.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteReading {
    pub note: String,
    pub midi: f32,
    pub frequency: f32,
    /// Offset from the nearest note.
    pub cents: f32,
}

#[derive(Debug, Clone)]
pub struct MonitorState {
    history: PitchHistory,
    current: Option<NoteReading>,
    paused: Option<PausedAnalysis>,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new(PitchHistory::default())
    }
}

impl MonitorState {
    pub fn new(history: PitchHistory) -> Self {
        Self {
            history,
            current: None,
            paused: None,
        }
    }

    pub fn history(&self) -> &PitchHistory {
        &self.history
    }

    pub fn visible_range(&self) -> VisibleRange {
        self.history.visible_range()
    }

    /// Latest valid reading of the running session.
    pub fn current(&self) -> Option<&NoteReading> {
        self.current.as_ref()
    }

    /// Snapshot taken at the last pause, cleared on resume.
    pub fn paused_analysis(&self) -> Option<&PausedAnalysis> {
        self.paused.as_ref()
    }
}

impl ToolState for MonitorState {
    fn accept(&mut self, reading: &Reading) {
        match *reading {
            Reading::Pitch { frequency, midi, .. } => {
                if let Some(nearest) = note::nearest_note(frequency) {
                    self.current = Some(NoteReading {
                        note: nearest.name,
                        midi,
                        frequency,
                        cents: nearest.cents,
                    });
                }
                self.history.push_pitch(midi);
            }
            Reading::Silence => self.history.push_silence(),
        }
    }

    fn reset(&mut self) {
        self.history.clear();
        self.current = None;
        self.paused = None;
    }

    fn on_stop(&mut self) {
        self.paused = None;
    }
}

/// The pitch monitor tool.
pub type PitchMonitor<B, E> = AnalysisEngine<B, E, MonitorState>;

impl<B: CaptureBackend, E: PitchEstimator> AnalysisEngine<B, E, MonitorState> {
    /// Builds a monitor from configuration.
    pub fn new(backend: B, estimator: E, config: &EngineConfig) -> Self {
        let history = PitchHistory::new(config.history_capacity, config.window_semitones);
        Self::with_state(
            backend,
            estimator,
            MonitorState::new(history),
            config.monitor_frame_size,
            config.clarity_threshold,
        )
    }

    /// Freezes the loop and analyses the last valid reading.
    ///
    /// Returns `None` when the history holds no valid reading.
    pub fn pause(&mut self) -> Result<Option<PausedAnalysis>, SessionError> {
        self.pause_ticks()?;
        let snapshot = self.state().history().paused_snapshot();
        debug!(?snapshot, "Monitor paused");
        self.state_mut().paused = snapshot.clone();
        Ok(snapshot)
    }

    pub fn resume(&mut self) -> Result<(), SessionError> {
        self.resume_ticks()?;
        self.state_mut().paused = None;
        debug!("Monitor resumed");
        Ok(())
    }

    /// Pauses a listening monitor or resumes a paused one.
    pub fn toggle_pause(&mut self) -> Result<Option<PausedAnalysis>, SessionError> {
        match self.session_state() {
            SessionState::Listening => self.pause(),
            SessionState::Paused => self.resume().map(|()| None),
            SessionState::Released => Err(SessionError::Released),
            state => Err(SessionError::InvalidTransition {
                action: "toggle pause",
                state,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn pitch(midi: f32) -> Reading {
        Reading::Pitch {
            frequency: note::midi_to_frequency(midi),
            midi,
            clarity: 0.99,
        }
    }

    #[test]
    fn pitch_updates_current_and_history() {
        let mut state = MonitorState::default();
        state.accept(&pitch(57.1));

        let current = state.current().unwrap();
        assert_eq!(current.note, "A3");
        assert_abs_diff_eq!(current.cents, 10.0, epsilon = 0.05);
        assert_eq!(state.history().last_pitch(), Some(57.1));
    }

    #[test]
    fn silence_pushes_sentinel_and_keeps_current() {
        let mut state = MonitorState::default();
        state.accept(&pitch(50.0));
        state.accept(&Reading::Silence);
        assert_eq!(state.history().len(), 2);
        assert!(state.history().entries().last().unwrap().is_silence());
        assert!(state.current().is_some());
    }

    #[test]
    fn reset_clears_everything() {
        let mut state = MonitorState::default();
        state.accept(&pitch(80.0));
        state.reset();
        assert!(state.history().is_empty());
        assert!(state.current().is_none());
        assert_eq!(state.visible_range(), VisibleRange::default());
    }
}
