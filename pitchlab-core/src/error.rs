//! Error types for pitchlab-core

use crate::session::SessionState;
use thiserror::Error;

/// Failures of the audio capture collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// The user (or the OS) refused microphone access.
    #[error("microphone access denied")]
    PermissionDenied,
    /// No input device, or the device cannot be opened in a usable format.
    #[error("input device unavailable: {0}")]
    DeviceUnavailable(String),
    /// The device went away while a session was running.
    #[error("input device disappeared mid-session: {0}")]
    UnexpectedTeardown(String),
    #[error("audio capture failed: {0}")]
    Unknown(String),
}

impl CaptureError {
    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            CaptureError::PermissionDenied => {
                "Microphone access denied. Please allow microphone access in your system settings."
            }
            CaptureError::UnexpectedTeardown(_) => {
                "The microphone was disconnected. Press start to listen again."
            }
            CaptureError::DeviceUnavailable(_) | CaptureError::Unknown(_) => {
                "Could not access the microphone."
            }
        }
    }
}

/// Errors raised by [`crate::session::AudioCaptureSession`] transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("cannot {action} while the session is {state}")]
    InvalidTransition {
        action: &'static str,
        state: SessionState,
    },
    /// The session has been released and must be replaced by a new one.
    #[error("capture session has been released")]
    Released,
}

/// Errors loading or validating an [`crate::config::EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown tuning '{0}'")]
    UnknownTuning(String),
    #[error("tuning '{0}' has no strings")]
    EmptyTuning(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },
}
