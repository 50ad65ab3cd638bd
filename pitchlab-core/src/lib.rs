// pitchlab-core/src/lib.rs

//! The core logic for the pitchlab guitar tuner and pitch monitor.
//! This crate is responsible for audio capture, pitch detection and the
//! real-time analysis loop. It is completely headless and contains no
//! rendering code: hosts read the tool state after each tick and draw it
//! however they like.

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod fft;
pub mod history;
pub mod monitor;
pub mod note;
pub mod pitch;
pub mod scheduler;
pub mod session;
pub mod synth;
pub mod tuner;
pub mod tuning;

pub use audio::CpalBackend;
pub use config::EngineConfig;
pub use engine::{AnalysisEngine, Reading, TickOutcome, ToolState};
pub use error::{CaptureError, ConfigError, SessionError};
pub use history::{HistoryEntry, PausedAnalysis, PitchHistory, VisibleRange};
pub use monitor::{MonitorState, NoteReading, PitchMonitor};
pub use pitch::{McLeodDetector, PitchEstimator, PitchSample};
pub use scheduler::{FrameScheduler, TickHandle};
pub use session::{AnalysisNode, AudioCaptureSession, CaptureBackend, SessionState};
pub use synth::ToneBackend;
pub use tuner::{GuitarTuner, TunerReading, TunerState, TuningStatus};
pub use tuning::{GuitarString, Tuning};
