//! # Audio Capture Module
//!
//! This module handles real-time audio capture using CPAL (Cross-Platform Audio Library).
//! [`CpalBackend`] is the microphone implementation of [`CaptureBackend`]: it opens
//! the default input device and streams sample chunks to the analysis node.
//!
//! ## Features
//! - Automatic audio device selection
//! - Configurable sample rate, 32-bit float input
//! - Multi-channel input downmixed to mono
//! - Device errors surfaced as categorised [`CaptureError`]s
//!
//! The device callback runs on CPAL's audio thread and only pushes chunks into
//! bounded channels. The analysis node drains them into its rolling buffer when
//! a frame is read, so everything else stays on the engine's thread.

use crate::error::CaptureError;
use crate::session::{AnalysisNode, CaptureBackend};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use std::collections::VecDeque;
use tracing::{info, warn};

/// Sample rate requested from the device when it supports it.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Chunks buffered between the audio callback and the analysis node.
const CHUNK_QUEUE_CAPACITY: usize = 64;

/// Microphone capture through the default CPAL host.
#[derive(Debug, Clone)]
pub struct CpalBackend {
    preferred_sample_rate: u32,
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}

impl CpalBackend {
    pub fn new(preferred_sample_rate: u32) -> Self {
        Self {
            preferred_sample_rate,
        }
    }
}

/// An open, playing input stream.
///
/// Dropping it pauses and closes the device.
pub struct CpalStream {
    stream: cpal::Stream,
    samples: Receiver<Vec<f32>>,
    errors: Receiver<CaptureError>,
    sample_rate: u32,
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        if let Err(e) = self.stream.pause() {
            warn!("Error pausing stream: {}", e);
        }
    }
}

/// Rolling time-domain view over a [`CpalStream`].
pub struct CpalAnalysisNode {
    samples: Receiver<Vec<f32>>,
    errors: Receiver<CaptureError>,
    rolling: VecDeque<f32>,
    frame_size: usize,
    sample_rate: u32,
}

impl CaptureBackend for CpalBackend {
    type Stream = CpalStream;
    type Node = CpalAnalysisNode;

    /// Opens the default input device and starts streaming.
    ///
    /// # Audio Configuration
    /// - Sample Rate: preferred rate (44.1 kHz by default), clamped to what the device supports
    /// - Format: 32-bit float
    /// - Channels: mono preferred, otherwise downmixed
    fn request_stream(&mut self) -> Result<CpalStream, CaptureError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| CaptureError::DeviceUnavailable("no input device available".into()))?;

        info!(
            "Using audio input device: {}",
            device.name().unwrap_or_else(|_| "<unnamed>".into())
        );

        let config = select_config(&device, self.preferred_sample_rate)?;
        let sample_rate = config.sample_rate.0;
        let channels = config.channels.max(1) as usize;
        info!("Selected sample rate: {} Hz, {} channel(s)", sample_rate, channels);

        let (sample_tx, sample_rx) = crossbeam_channel::bounded::<Vec<f32>>(CHUNK_QUEUE_CAPACITY);
        let (error_tx, error_rx) = crossbeam_channel::bounded::<CaptureError>(1);
        let overflow_rx = sample_rx.clone();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mono = if channels == 1 {
                        data.to_vec()
                    } else {
                        data.chunks(channels)
                            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                            .collect()
                    };
                    push_latest(&sample_tx, &overflow_rx, mono);
                },
                move |err| {
                    warn!("An error occurred on the audio stream: {}", err);
                    if let cpal::StreamError::DeviceNotAvailable = err {
                        let _ = error_tx.try_send(CaptureError::UnexpectedTeardown(err.to_string()));
                    }
                },
                None,
            )
            .map_err(map_build_error)?;

        stream.play().map_err(map_play_error)?;

        Ok(CpalStream {
            stream,
            samples: sample_rx,
            errors: error_rx,
            sample_rate,
        })
    }

    fn create_analysis_node(
        &mut self,
        stream: &CpalStream,
        frame_size: usize,
    ) -> Result<CpalAnalysisNode, CaptureError> {
        Ok(CpalAnalysisNode {
            samples: stream.samples.clone(),
            errors: stream.errors.clone(),
            rolling: VecDeque::with_capacity(frame_size * 2),
            frame_size,
            sample_rate: stream.sample_rate,
        })
    }
}

impl AnalysisNode for CpalAnalysisNode {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_time_domain(&mut self, buffer: &mut [f32]) -> Result<(), CaptureError> {
        if let Ok(err) = self.errors.try_recv() {
            return Err(err);
        }

        loop {
            match self.samples.try_recv() {
                Ok(chunk) => self.rolling.extend(chunk),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    return Err(CaptureError::UnexpectedTeardown("audio stream closed".into()));
                }
            }
        }

        let keep = self.frame_size.max(buffer.len());
        let excess = self.rolling.len().saturating_sub(keep);
        self.rolling.drain(..excess);

        copy_latest(&self.rolling, buffer);
        Ok(())
    }
}

/// Queues `chunk`, evicting the oldest queued chunk when the queue is full.
///
/// While nobody reads (a paused monitor) the queue keeps the most recent
/// audio, so the first frame after a resume is current.
fn push_latest(tx: &Sender<Vec<f32>>, queue: &Receiver<Vec<f32>>, chunk: Vec<f32>) {
    if let Err(TrySendError::Full(chunk)) = tx.try_send(chunk) {
        let _ = queue.try_recv();
        let _ = tx.try_send(chunk);
    }
}

/// Copies the newest `buffer.len()` samples into `buffer`, zero-filling the
/// front while the rolling buffer is still warming up.
fn copy_latest(rolling: &VecDeque<f32>, buffer: &mut [f32]) {
    let wanted = buffer.len();
    let available = rolling.len().min(wanted);
    let (silence, recent) = buffer.split_at_mut(wanted - available);
    silence.fill(0.0);
    for (dst, src) in recent.iter_mut().zip(rolling.range(rolling.len() - available..)) {
        *dst = *src;
    }
}

fn select_config(device: &cpal::Device, target_rate: u32) -> Result<cpal::StreamConfig, CaptureError> {
    let configs = device
        .supported_input_configs()
        .map_err(map_configs_error)?
        .collect::<Vec<_>>();

    if let Some(range) = find_supported_config(configs, target_rate) {
        let rate = target_rate.clamp(range.min_sample_rate().0, range.max_sample_rate().0);
        return Ok(range.with_sample_rate(cpal::SampleRate(rate)).into());
    }

    Err(CaptureError::DeviceUnavailable(
        "no suitable f32 input format found".into(),
    ))
}

/// Finds the best supported audio configuration for the target sample rate.
///
/// Only 32-bit float formats qualify. Among those, mono wins over
/// multi-channel, then the range closest to `target_rate`.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min = c.min_sample_rate().0;
            let max = c.max_sample_rate().0;
            let distance = if (min..=max).contains(&target_rate) {
                0
            } else {
                min.abs_diff(target_rate).min(max.abs_diff(target_rate))
            };
            (c.channels() != 1, distance)
        })
}

/// Best-effort detection of an OS permission refusal in a backend message.
fn backend_error(description: String) -> CaptureError {
    let lower = description.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized") {
        CaptureError::PermissionDenied
    } else {
        CaptureError::Unknown(description)
    }
}

fn map_configs_error(err: cpal::SupportedStreamConfigsError) -> CaptureError {
    match err {
        cpal::SupportedStreamConfigsError::DeviceNotAvailable => {
            CaptureError::DeviceUnavailable(err.to_string())
        }
        cpal::SupportedStreamConfigsError::BackendSpecific { err } => backend_error(err.description),
        other => CaptureError::Unknown(other.to_string()),
    }
}

fn map_build_error(err: cpal::BuildStreamError) -> CaptureError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable
        | cpal::BuildStreamError::StreamConfigNotSupported => {
            CaptureError::DeviceUnavailable(err.to_string())
        }
        cpal::BuildStreamError::BackendSpecific { err } => backend_error(err.description),
        other => CaptureError::Unknown(other.to_string()),
    }
}

fn map_play_error(err: cpal::PlayStreamError) -> CaptureError {
    match err {
        cpal::PlayStreamError::DeviceNotAvailable => CaptureError::DeviceUnavailable(err.to_string()),
        cpal::PlayStreamError::BackendSpecific { err } => backend_error(err.description),
        #[allow(unreachable_patterns)]
        other => CaptureError::Unknown(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_latest_zero_fills_while_warming_up() {
        let rolling: VecDeque<f32> = vec![1.0, 2.0].into();
        let mut buffer = [9.0; 4];
        copy_latest(&rolling, &mut buffer);
        assert_eq!(buffer, [0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn copy_latest_takes_newest_samples() {
        let rolling: VecDeque<f32> = (0..10).map(|i| i as f32).collect();
        let mut buffer = [0.0; 3];
        copy_latest(&rolling, &mut buffer);
        assert_eq!(buffer, [7.0, 8.0, 9.0]);
    }

    #[test]
    fn node_reads_are_snapshots() {
        let (tx, rx) = crossbeam_channel::bounded(4);
        let (_err_tx, err_rx) = crossbeam_channel::bounded(1);
        let mut node = CpalAnalysisNode {
            samples: rx,
            errors: err_rx,
            rolling: VecDeque::new(),
            frame_size: 4,
            sample_rate: 44100,
        };

        tx.send(vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let mut first = [0.0; 4];
        node.read_time_domain(&mut first).unwrap();
        assert_eq!(first, [2.0, 3.0, 4.0, 5.0]);

        // No new input: the same window again.
        let mut second = [0.0; 4];
        node.read_time_domain(&mut second).unwrap();
        assert_eq!(second, first);

        tx.send(vec![6.0]).unwrap();
        node.read_time_domain(&mut second).unwrap();
        assert_eq!(second, [3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn full_queue_keeps_newest_chunks() {
        let (tx, rx) = crossbeam_channel::bounded(2);
        let (_err_tx, err_rx) = crossbeam_channel::bounded(1);
        let mut node = CpalAnalysisNode {
            samples: rx.clone(),
            errors: err_rx,
            rolling: VecDeque::new(),
            frame_size: 2,
            sample_rate: 44100,
        };

        // Nothing reads while paused; the callback keeps pushing.
        for i in 0..10 {
            push_latest(&tx, &rx, vec![i as f32]);
        }
        assert_eq!(rx.len(), 2);

        let mut frame = [0.0; 2];
        node.read_time_domain(&mut frame).unwrap();
        assert_eq!(frame, [8.0, 9.0]);
    }

    #[test]
    fn node_reports_teardown() {
        let (tx, rx) = crossbeam_channel::bounded::<Vec<f32>>(4);
        let (err_tx, err_rx) = crossbeam_channel::bounded(1);
        let mut node = CpalAnalysisNode {
            samples: rx,
            errors: err_rx,
            rolling: VecDeque::new(),
            frame_size: 4,
            sample_rate: 44100,
        };
        let mut buffer = [0.0; 4];

        err_tx.send(CaptureError::UnexpectedTeardown("gone".into())).unwrap();
        assert!(node.read_time_domain(&mut buffer).is_err());

        drop(tx);
        assert!(matches!(
            node.read_time_domain(&mut buffer),
            Err(CaptureError::UnexpectedTeardown(_))
        ));
    }

    #[test]
    fn permission_messages_are_recognised() {
        assert_eq!(
            backend_error("Access denied by user".into()),
            CaptureError::PermissionDenied
        );
        assert!(matches!(backend_error("xrun".into()), CaptureError::Unknown(_)));
    }
}
