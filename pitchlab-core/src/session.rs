//! # Capture Session Module
//!
//! [`AudioCaptureSession`] owns the live input stream and the analysis node
//! bound to it, and moves through an explicit state machine:
//!
//! ```text
//! Idle --start--> Acquiring --granted--> Listening --stop--> Released
//!                     |                   ^     |
//!                     +--denied/failed--+ |     | pause / resume
//!                                       | |     v
//!                                       | +-- Paused --stop--> Released
//!                                       +----------------------> Released
//! ```
//!
//! Released is terminal. A released session is discarded and a new one is
//! constructed for the next start.

use crate::error::{CaptureError, SessionError};
use std::fmt;
use tracing::{debug, warn};

/// The host-side audio capture collaborator.
pub trait CaptureBackend {
    /// Live input stream; dropping it releases the device.
    type Stream;
    /// Analysis node reading time-domain samples off a stream.
    type Node: AnalysisNode;

    /// Requests access to the microphone.
    fn request_stream(&mut self) -> Result<Self::Stream, CaptureError>;

    /// Binds an analysis node producing frames of `frame_size` samples.
    fn create_analysis_node(
        &mut self,
        stream: &Self::Stream,
        frame_size: usize,
    ) -> Result<Self::Node, CaptureError>;
}

/// Snapshot access to the most recent samples of a live stream.
pub trait AnalysisNode {
    fn sample_rate(&self) -> u32;

    /// Copies the latest `buffer.len()` samples into `buffer`.
    ///
    /// This is a snapshot of a rolling buffer, not a consuming read: two calls
    /// with no new input in between return overlapping data.
    fn read_time_domain(&mut self, buffer: &mut [f32]) -> Result<(), CaptureError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Acquiring,
    Listening,
    Paused,
    Released,
}

impl SessionState {
    /// Whether the session currently holds (or is acquiring) capture resources.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionState::Acquiring | SessionState::Listening | SessionState::Paused
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Acquiring => "acquiring",
            SessionState::Listening => "listening",
            SessionState::Paused => "paused",
            SessionState::Released => "released",
        };
        f.write_str(name)
    }
}

/// One microphone capture, from acquisition to release.
pub struct AudioCaptureSession<B: CaptureBackend> {
    state: SessionState,
    frame_size: usize,
    // Declared before `stream` so the node is dropped first.
    node: Option<B::Node>,
    stream: Option<B::Stream>,
    sample_rate: Option<u32>,
    failure: Option<CaptureError>,
}

impl<B: CaptureBackend> AudioCaptureSession<B> {
    /// Creates an idle session that will analyse frames of `frame_size` samples.
    pub fn new(frame_size: usize) -> Self {
        Self {
            state: SessionState::Idle,
            frame_size,
            node: None,
            stream: None,
            sample_rate: None,
            failure: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Sample rate of the bound node, once Listening.
    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    /// The error that released this session, if any.
    pub fn failure(&self) -> Option<&CaptureError> {
        self.failure.as_ref()
    }

    /// Acquires the microphone and binds the analysis node.
    ///
    /// The session stays in `Acquiring` until the backend answers. On any
    /// failure it goes straight to `Released` and the categorised error is
    /// returned; the session must then be discarded.
    pub fn start(&mut self, backend: &mut B) -> Result<(), SessionError> {
        match self.state {
            SessionState::Idle => {}
            SessionState::Released => return Err(SessionError::Released),
            state => {
                return Err(SessionError::InvalidTransition {
                    action: "start",
                    state,
                });
            }
        }

        self.state = SessionState::Acquiring;
        debug!("Capture session acquiring microphone");

        let frame_size = self.frame_size;
        let acquired = backend.request_stream().and_then(|stream| {
            let node = backend.create_analysis_node(&stream, frame_size)?;
            Ok((stream, node))
        });

        match acquired {
            Ok((stream, node)) => {
                self.sample_rate = Some(node.sample_rate());
                self.stream = Some(stream);
                self.node = Some(node);
                self.state = SessionState::Listening;
                debug!(sample_rate = ?self.sample_rate, "Capture session listening");
                Ok(())
            }
            Err(err) => {
                warn!("Failed to start capture session: {}", err);
                self.release(Some(err.clone()));
                Err(err.into())
            }
        }
    }

    /// Freezes analysis; the stream stays open.
    pub fn pause(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Listening => {
                self.state = SessionState::Paused;
                debug!("Capture session paused");
                Ok(())
            }
            SessionState::Released => Err(SessionError::Released),
            state => Err(SessionError::InvalidTransition {
                action: "pause",
                state,
            }),
        }
    }

    pub fn resume(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Paused => {
                self.state = SessionState::Listening;
                debug!("Capture session resumed");
                Ok(())
            }
            SessionState::Released => Err(SessionError::Released),
            state => Err(SessionError::InvalidTransition {
                action: "resume",
                state,
            }),
        }
    }

    /// Releases the stream and the analysis node. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if self.state == SessionState::Released {
            return;
        }
        self.release(None);
    }

    /// Reads a snapshot of the current time-domain samples into `buffer`.
    ///
    /// Fails with [`SessionError::Released`] once the session has been
    /// released. A failing device releases the session before the error is
    /// returned, so later calls fail cleanly too.
    pub fn get_frame(&mut self, buffer: &mut [f32]) -> Result<(), SessionError> {
        let Some(node) = self.node.as_mut() else {
            return match self.state {
                SessionState::Released => Err(SessionError::Released),
                state => Err(SessionError::InvalidTransition {
                    action: "read a frame",
                    state,
                }),
            };
        };

        if let Err(err) = node.read_time_domain(buffer) {
            warn!("Capture failed mid-session: {}", err);
            let err = match err {
                CaptureError::UnexpectedTeardown(_) => err,
                other => CaptureError::UnexpectedTeardown(other.to_string()),
            };
            self.release(Some(err.clone()));
            return Err(err.into());
        }
        Ok(())
    }

    fn release(&mut self, failure: Option<CaptureError>) {
        self.node = None;
        self.stream = None;
        self.sample_rate = None;
        if failure.is_some() {
            self.failure = failure;
        }
        self.state = SessionState::Released;
        debug!("Capture session released");
    }
}
