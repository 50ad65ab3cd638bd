//! Engine lifecycle tests with scripted capture and estimation.

use approx::assert_abs_diff_eq;
use pitchlab_core::{
    AnalysisNode, CaptureBackend, CaptureError, EngineConfig, GuitarTuner, PitchEstimator,
    PitchMonitor, PitchSample, SessionError, SessionState, TickOutcome, VisibleRange, note,
};
use std::cell::Cell;
use std::rc::Rc;

// --- Scripted collaborators ---

#[derive(Clone)]
struct MockBackend {
    outcome: Result<(), CaptureError>,
    fail_reads_after: Option<usize>,
    open_streams: Rc<Cell<usize>>,
}

impl MockBackend {
    fn new() -> Self {
        Self {
            outcome: Ok(()),
            fail_reads_after: None,
            open_streams: Rc::new(Cell::new(0)),
        }
    }
}

struct MockStream {
    open: Rc<Cell<usize>>,
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.open.set(self.open.get() - 1);
    }
}

struct MockNode {
    reads: usize,
    fail_after: Option<usize>,
}

impl CaptureBackend for MockBackend {
    type Stream = MockStream;
    type Node = MockNode;

    fn request_stream(&mut self) -> Result<MockStream, CaptureError> {
        self.outcome.clone()?;
        self.open_streams.set(self.open_streams.get() + 1);
        Ok(MockStream {
            open: self.open_streams.clone(),
        })
    }

    fn create_analysis_node(
        &mut self,
        _stream: &MockStream,
        _frame_size: usize,
    ) -> Result<MockNode, CaptureError> {
        Ok(MockNode {
            reads: 0,
            fail_after: self.fail_reads_after,
        })
    }
}

impl AnalysisNode for MockNode {
    fn sample_rate(&self) -> u32 {
        44100
    }

    fn read_time_domain(&mut self, buffer: &mut [f32]) -> Result<(), CaptureError> {
        if self.fail_after.is_some_and(|n| self.reads >= n) {
            return Err(CaptureError::UnexpectedTeardown("unplugged".into()));
        }
        self.reads += 1;
        buffer.fill(0.0);
        Ok(())
    }
}

/// Returns whatever the test last put in `output`.
#[derive(Clone)]
struct ScriptedEstimator {
    output: Rc<Cell<PitchSample>>,
    calls: Rc<Cell<usize>>,
}

impl ScriptedEstimator {
    fn new() -> Self {
        Self {
            output: Rc::new(Cell::new(PitchSample::NONE)),
            calls: Rc::new(Cell::new(0)),
        }
    }

    fn set(&self, frequency: f32, clarity: f32) {
        self.output.set(PitchSample::new(frequency, clarity));
    }

    fn set_midi(&self, midi: f32) {
        self.set(note::midi_to_frequency(midi), 0.99);
    }
}

impl PitchEstimator for ScriptedEstimator {
    fn estimate(&mut self, _frame: &[f32], _sample_rate: u32) -> PitchSample {
        self.calls.set(self.calls.get() + 1);
        self.output.get()
    }
}

struct PanickingEstimator;

impl PitchEstimator for PanickingEstimator {
    fn estimate(&mut self, _frame: &[f32], _sample_rate: u32) -> PitchSample {
        panic!("estimator blew up");
    }
}

fn tuner() -> (GuitarTuner<MockBackend, ScriptedEstimator>, ScriptedEstimator) {
    let estimator = ScriptedEstimator::new();
    let tuner = GuitarTuner::new(MockBackend::new(), estimator.clone(), &EngineConfig::default())
        .expect("default config is valid");
    (tuner, estimator)
}

fn monitor() -> (PitchMonitor<MockBackend, ScriptedEstimator>, ScriptedEstimator) {
    let estimator = ScriptedEstimator::new();
    let monitor = PitchMonitor::new(MockBackend::new(), estimator.clone(), &EngineConfig::default());
    (monitor, estimator)
}

// --- Tuner ---

#[test]
fn tuner_reports_a_string_and_holds_it_on_low_clarity() {
    let (mut tuner, estimator) = tuner();
    tuner.start().unwrap();
    assert_eq!(tuner.session_state(), SessionState::Listening);

    estimator.set(110.0, 0.99);
    for _ in 0..10 {
        assert!(matches!(tuner.run_tick(), TickOutcome::Detected(_)));
    }
    let reading = tuner.state().reading().cloned().unwrap();
    assert_eq!(reading.string.name, "A");
    assert_eq!(reading.string.target_midi, 45);
    assert_abs_diff_eq!(reading.cents_off, 0.0, epsilon = 0.01);

    estimator.set(110.0, 0.5);
    for _ in 0..5 {
        assert!(matches!(tuner.run_tick(), TickOutcome::NoPitch(_)));
    }
    assert_eq!(tuner.state().reading(), Some(&reading));
    assert_eq!(tuner.ticks(), 15);
}

#[test]
fn tuner_stop_clears_display_and_releases_stream() {
    let (mut tuner, estimator) = tuner();
    tuner.start().unwrap();
    estimator.set(82.41, 0.99);
    tuner.run_tick();
    assert!(tuner.state().active_string().is_some());

    tuner.stop();
    tuner.stop();
    assert!(tuner.state().active_string().is_none());
    assert_eq!(tuner.session_state(), SessionState::Released);
    assert_eq!(tuner.backend().open_streams.get(), 0);
}

#[test]
fn stale_tick_after_stop_is_inert() {
    let (mut tuner, estimator) = tuner();
    tuner.start().unwrap();
    estimator.set(110.0, 0.99);

    let handle = tuner.request_tick().unwrap();
    tuner.stop();
    assert_eq!(tuner.tick(handle), TickOutcome::Inert);
    assert_eq!(estimator.calls.get(), 0);

    // A restart does not revive handles from the previous session.
    tuner.start().unwrap();
    assert_eq!(tuner.tick(handle), TickOutcome::Inert);
    assert!(matches!(tuner.run_tick(), TickOutcome::Detected(_)));
}

#[test]
fn permission_denied_never_reaches_listening() {
    let (mut tuner, _estimator) = tuner();
    tuner.backend_mut().outcome = Err(CaptureError::PermissionDenied);

    let err = tuner.start().unwrap_err();
    assert_eq!(err, SessionError::Capture(CaptureError::PermissionDenied));
    assert_eq!(tuner.session_state(), SessionState::Released);
    assert_eq!(tuner.last_error(), Some(&CaptureError::PermissionDenied));
    assert!(tuner.request_tick().is_none());
    assert!(
        CaptureError::PermissionDenied
            .user_message()
            .contains("Microphone access denied")
    );

    // The user grants access and presses start again.
    tuner.backend_mut().outcome = Ok(());
    tuner.start().unwrap();
    assert!(tuner.is_listening());
    assert!(tuner.last_error().is_none());
}

#[test]
fn device_loss_self_stops_the_loop() {
    let (mut tuner, estimator) = tuner();
    tuner.backend_mut().fail_reads_after = Some(3);
    tuner.start().unwrap();
    estimator.set(110.0, 0.99);

    for _ in 0..3 {
        assert!(matches!(tuner.run_tick(), TickOutcome::Detected(_)));
    }
    let handle = tuner.request_tick().unwrap();
    assert!(matches!(
        tuner.tick(handle),
        TickOutcome::Stopped(CaptureError::UnexpectedTeardown(_))
    ));
    assert_eq!(tuner.session_state(), SessionState::Released);
    assert_eq!(tuner.backend().open_streams.get(), 0);

    // Later callbacks are no-ops.
    assert_eq!(tuner.tick(handle), TickOutcome::Inert);
    assert_eq!(tuner.run_tick(), TickOutcome::Inert);
}

#[test]
fn start_while_listening_is_a_no_op() {
    let (mut tuner, estimator) = tuner();
    tuner.start().unwrap();
    estimator.set(110.0, 0.99);
    tuner.run_tick();

    tuner.start().unwrap();
    assert!(tuner.state().reading().is_some());
    assert_eq!(tuner.backend().open_streams.get(), 1);
}

#[test]
fn estimator_panic_counts_as_no_detection() {
    let mut tuner = GuitarTuner::new(MockBackend::new(), PanickingEstimator, &EngineConfig::default())
        .unwrap();
    tuner.start().unwrap();
    assert_eq!(tuner.run_tick(), TickOutcome::NoPitch(PitchSample::NONE));
    assert!(tuner.is_listening());
}

// --- Monitor ---

#[test]
fn monitor_history_and_window_follow_detections() {
    let (mut monitor, estimator) = monitor();
    monitor.start().unwrap();

    estimator.set_midi(59.0);
    monitor.run_tick();
    assert_eq!(monitor.state().visible_range(), VisibleRange::default());

    estimator.set(0.0, 0.0);
    monitor.run_tick();
    estimator.set_midi(75.0);
    monitor.run_tick();

    let range = monitor.state().visible_range();
    assert_abs_diff_eq!(range.min_midi, 69.0, epsilon = 1e-3);
    assert_abs_diff_eq!(range.max_midi, 81.0, epsilon = 1e-3);

    let raw: Vec<f32> = monitor.state().history().entries().map(|e| e.to_raw()).collect();
    assert_eq!(raw.len(), 3);
    assert_eq!(raw[1], 0.0);
}

#[test]
fn monitor_pause_snapshots_last_valid_reading() {
    let (mut monitor, estimator) = monitor();
    monitor.start().unwrap();

    estimator.set(445.0, 0.99);
    monitor.run_tick();
    estimator.set(445.0, 0.2);
    monitor.run_tick();
    monitor.run_tick();

    let pending = monitor.request_tick().unwrap();
    let snapshot = monitor.pause().unwrap().unwrap();
    assert_eq!(snapshot.note, "A4");
    assert_eq!(snapshot.target_frequency, 440.0);
    assert_abs_diff_eq!(snapshot.frequency, 445.0, epsilon = 0.01);
    assert_abs_diff_eq!(snapshot.cents, 19.56, epsilon = 0.01);
    assert_eq!(monitor.state().paused_analysis(), Some(&snapshot));

    // Pausing cancels the tick that was already scheduled.
    let before = monitor.state().history().len();
    assert_eq!(monitor.tick(pending), TickOutcome::Inert);
    assert!(monitor.request_tick().is_none());
    assert_eq!(monitor.state().history().len(), before);

    assert_eq!(monitor.toggle_pause().unwrap(), None);
    assert!(monitor.state().paused_analysis().is_none());
    assert_eq!(monitor.tick(pending), TickOutcome::Inert);
    assert!(matches!(monitor.run_tick(), TickOutcome::NoPitch(_)));
}

#[test]
fn pausing_in_total_silence_gives_no_snapshot() {
    let (mut monitor, _estimator) = monitor();
    monitor.start().unwrap();
    monitor.run_tick();
    monitor.run_tick();
    assert_eq!(monitor.pause().unwrap(), None);
    assert_eq!(monitor.session_state(), SessionState::Paused);
}

#[test]
fn pause_requires_a_running_monitor() {
    let (mut monitor, _estimator) = monitor();
    assert!(matches!(
        monitor.toggle_pause(),
        Err(SessionError::InvalidTransition { state: SessionState::Idle, .. })
    ));
    monitor.start().unwrap();
    monitor.stop();
    assert_eq!(monitor.pause(), Err(SessionError::Released));
}

#[test]
fn new_session_starts_with_empty_history_and_default_window() {
    let (mut monitor, estimator) = monitor();
    monitor.start().unwrap();
    estimator.set_midi(80.0);
    for _ in 0..20 {
        monitor.run_tick();
    }
    monitor.stop();
    // History stays visible after stop.
    assert_eq!(monitor.state().history().len(), 20);

    monitor.start().unwrap();
    assert!(monitor.state().history().is_empty());
    assert_eq!(monitor.state().visible_range(), VisibleRange::default());
    assert!(monitor.state().current().is_none());
}

#[test]
fn monitor_history_is_capped() {
    let (mut monitor, estimator) = monitor();
    monitor.start().unwrap();
    estimator.set_midi(57.0);
    for _ in 0..600 {
        monitor.run_tick();
    }
    assert_eq!(monitor.state().history().len(), 500);
    assert!(monitor.state().history().is_warmed_up());
}
