//! # Analysis Engine
//!
//! [`AnalysisEngine`] is the continuous loop shared by the tuner and the
//! monitor. It owns the capture backend, the current [`AudioCaptureSession`],
//! a [`FrameScheduler`] and a pitch estimator, and feeds every tick's
//! result into a tool-specific [`ToolState`].
//!
//! ## Tick pipeline
//! 1. Check the tick handle against the scheduler's generation
//! 2. Snapshot the latest samples from the session
//! 3. Run the pitch estimator
//! 4. Apply the confidence gate
//! 5. Hand a [`Reading`] to the tool state
//!
//! The host drives the loop: once per display refresh it calls
//! [`AnalysisEngine::request_tick`] and later passes the handle to
//! [`AnalysisEngine::tick`]. Ticks take `&mut self`, so tick *n+1* can only
//! begin after tick *n* has committed its state.

use crate::error::{CaptureError, SessionError};
use crate::note;
use crate::pitch::{PitchEstimator, PitchSample};
use crate::scheduler::{FrameScheduler, TickHandle};
use crate::session::{AudioCaptureSession, CaptureBackend, SessionState};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, info, warn};

/// Clarity a reading must exceed to count as a detection.
pub const DEFAULT_CLARITY_THRESHOLD: f32 = 0.95;

/// What one tick delivers to the tool state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// The frame passed the confidence gate.
    Pitch { frequency: f32, midi: f32, clarity: f32 },
    /// Nothing detected. Normal operation, not an error.
    Silence,
}

/// Tool-specific state updated by every tick.
pub trait ToolState {
    fn accept(&mut self, reading: &Reading);

    /// Called when a new session starts.
    fn reset(&mut self);

    /// Called when the session is stopped or torn down.
    fn on_stop(&mut self) {}
}

/// Result of running a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The handle was stale or the session is not listening; nothing ran.
    Inert,
    /// A reading passed the confidence gate.
    Detected(PitchSample),
    /// The estimator's answer was below the gate.
    NoPitch(PitchSample),
    /// The capture failed; the engine stopped itself.
    Stopped(CaptureError),
}

pub struct AnalysisEngine<B: CaptureBackend, E: PitchEstimator, S: ToolState> {
    backend: B,
    estimator: E,
    state: S,
    session: AudioCaptureSession<B>,
    scheduler: FrameScheduler,
    frame: Vec<f32>,
    clarity_threshold: f32,
    last_error: Option<CaptureError>,
}

impl<B: CaptureBackend, E: PitchEstimator, S: ToolState> AnalysisEngine<B, E, S> {
    /// Builds an idle engine analysing frames of `frame_size` samples.
    pub fn with_state(
        backend: B,
        estimator: E,
        state: S,
        frame_size: usize,
        clarity_threshold: f32,
    ) -> Self {
        Self {
            backend,
            estimator,
            state,
            session: AudioCaptureSession::new(frame_size),
            scheduler: FrameScheduler::new(),
            frame: vec![0.0; frame_size],
            clarity_threshold,
            last_error: None,
        }
    }

    /// Starts a fresh capture session.
    ///
    /// Does nothing if a session is already active. Otherwise the previous
    /// (released) session is discarded, the tool state is reset and a new
    /// session acquires the microphone.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.session.state().is_active() {
            debug!("Start requested while {}; ignoring", self.session.state());
            return Ok(());
        }

        self.scheduler.cancel();
        self.session = AudioCaptureSession::new(self.frame.len());
        self.state.reset();
        self.last_error = None;

        match self.session.start(&mut self.backend) {
            Ok(()) => {
                self.scheduler.arm();
                info!(
                    sample_rate = ?self.session.sample_rate(),
                    frame_size = self.frame.len(),
                    "Analysis started"
                );
                Ok(())
            }
            Err(err) => {
                if let SessionError::Capture(capture) = &err {
                    self.last_error = Some(capture.clone());
                }
                Err(err)
            }
        }
    }

    /// Cancels the pending tick and releases the capture resources.
    pub fn stop(&mut self) {
        self.scheduler.cancel();
        if self.session.state() != SessionState::Released {
            self.session.stop();
            self.state.on_stop();
            info!("Analysis stopped");
        }
    }

    /// Schedules the next tick; `None` unless the session is listening.
    pub fn request_tick(&self) -> Option<TickHandle> {
        if self.session.state() == SessionState::Listening {
            self.scheduler.request()
        } else {
            None
        }
    }

    /// Runs one tick of the analysis loop.
    ///
    /// A stale handle (issued before a pause, stop or restart) makes this a
    /// no-op. Capture failures never escape: the engine stops itself and
    /// reports [`TickOutcome::Stopped`].
    pub fn tick(&mut self, handle: TickHandle) -> TickOutcome {
        if !self.scheduler.is_live(handle) || self.session.state() != SessionState::Listening {
            return TickOutcome::Inert;
        }
        let Some(sample_rate) = self.session.sample_rate() else {
            return TickOutcome::Inert;
        };

        if let Err(err) = self.session.get_frame(&mut self.frame) {
            return self.self_stop(err);
        }

        let estimator = &mut self.estimator;
        let frame = &self.frame;
        let sample = match panic::catch_unwind(AssertUnwindSafe(|| {
            estimator.estimate(frame, sample_rate)
        })) {
            Ok(sample) => sample,
            Err(_) => {
                warn!("Pitch estimator panicked; treating frame as silence");
                PitchSample::NONE
            }
        };

        let outcome = if sample.passes_gate(self.clarity_threshold) {
            let reading = Reading::Pitch {
                frequency: sample.frequency,
                midi: note::frequency_to_midi(sample.frequency),
                clarity: sample.clarity,
            };
            self.state.accept(&reading);
            TickOutcome::Detected(sample)
        } else {
            self.state.accept(&Reading::Silence);
            TickOutcome::NoPitch(sample)
        };

        self.scheduler.commit();
        outcome
    }

    /// Requests and immediately runs a tick.
    pub fn run_tick(&mut self) -> TickOutcome {
        match self.request_tick() {
            Some(handle) => self.tick(handle),
            None => TickOutcome::Inert,
        }
    }

    fn self_stop(&mut self, err: SessionError) -> TickOutcome {
        self.scheduler.cancel();
        let capture = match err {
            SessionError::Capture(capture) => capture,
            other => CaptureError::Unknown(other.to_string()),
        };
        // The session already released itself; make sure of it either way.
        self.session.stop();
        self.state.on_stop();
        warn!("Analysis stopped after capture failure: {}", capture);
        self.last_error = Some(capture.clone());
        TickOutcome::Stopped(capture)
    }

    pub(crate) fn pause_ticks(&mut self) -> Result<(), SessionError> {
        self.session.pause()?;
        self.scheduler.cancel();
        Ok(())
    }

    pub(crate) fn resume_ticks(&mut self) -> Result<(), SessionError> {
        self.session.resume()?;
        self.scheduler.arm();
        Ok(())
    }

    pub(crate) fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn is_listening(&self) -> bool {
        self.session.state() == SessionState::Listening
    }

    /// The capture error that ended (or prevented) the current session.
    pub fn last_error(&self) -> Option<&CaptureError> {
        self.last_error.as_ref()
    }

    pub fn clarity_threshold(&self) -> f32 {
        self.clarity_threshold
    }

    pub fn frame_size(&self) -> usize {
        self.frame.len()
    }

    /// Ticks that ran to completion since the engine was built.
    pub fn ticks(&self) -> u64 {
        self.scheduler.ticks()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: CaptureBackend, E: PitchEstimator, S: ToolState> Drop for AnalysisEngine<B, E, S> {
    fn drop(&mut self) {
        self.scheduler.cancel();
        self.session.stop();
    }
}
