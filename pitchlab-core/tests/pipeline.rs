//! Full pipeline: synthetic tone through capture, detection and tool state.

use approx::assert_abs_diff_eq;
use pitchlab_core::{
    EngineConfig, GuitarTuner, McLeodDetector, PitchMonitor, TickOutcome, ToneBackend, TuningStatus,
};

#[test]
fn tuner_locks_onto_open_a_string() {
    let config = EngineConfig::default();
    let detector = McLeodDetector::new(config.tuner_frame_size);
    let mut tuner = GuitarTuner::new(ToneBackend::new(110.0), detector, &config).unwrap();
    tuner.start().unwrap();

    for _ in 0..5 {
        assert!(matches!(tuner.run_tick(), TickOutcome::Detected(_)));
    }

    let reading = tuner.state().reading().unwrap();
    assert_eq!(reading.string.name, "A");
    assert_eq!(reading.detected_note, "A2");
    assert_abs_diff_eq!(reading.frequency, 110.0, epsilon = 1.0);
    assert_eq!(tuner.state().status(), Some(TuningStatus::InTune));
}

#[test]
fn tuner_reports_flat_low_e() {
    let config = EngineConfig::default();
    let detector = McLeodDetector::new(config.tuner_frame_size);
    // About 30 cents flat of E2.
    let mut tuner = GuitarTuner::new(ToneBackend::new(81.0), detector, &config).unwrap();
    tuner.start().unwrap();
    tuner.run_tick();

    let reading = tuner.state().reading().unwrap();
    assert_eq!(reading.string.string_number, 6);
    assert!(reading.cents_off < -20.0);
    assert_eq!(tuner.state().status(), Some(TuningStatus::Flat));
}

#[test]
fn silent_input_never_detects() {
    let config = EngineConfig::default();
    let detector = McLeodDetector::new(config.monitor_frame_size);
    let backend = ToneBackend::new(440.0).with_amplitude(0.0);
    let mut monitor = PitchMonitor::new(backend, detector, &config);
    monitor.start().unwrap();

    for _ in 0..10 {
        assert!(matches!(monitor.run_tick(), TickOutcome::NoPitch(_)));
    }
    assert!(monitor.state().history().entries().all(|e| e.is_silence()));
    assert_eq!(monitor.pause().unwrap(), None);
}

#[test]
fn monitor_follows_concert_a() {
    let config = EngineConfig::default();
    let detector = McLeodDetector::new(config.monitor_frame_size);
    let mut monitor = PitchMonitor::new(ToneBackend::new(440.0), detector, &config);
    monitor.start().unwrap();

    for _ in 0..8 {
        monitor.run_tick();
    }
    let current = monitor.state().current().unwrap();
    assert_eq!(current.note, "A4");
    assert_abs_diff_eq!(current.cents, 0.0, epsilon = 5.0);

    // A4 is far above the default window, so it recentred.
    let range = monitor.state().visible_range();
    assert!(range.contains(69.0));
    assert_abs_diff_eq!(range.span(), 12.0, epsilon = 1e-4);

    let snapshot = monitor.pause().unwrap().unwrap();
    assert_eq!(snapshot.note, "A4");
    assert_eq!(snapshot.target_frequency, 440.0);
}
