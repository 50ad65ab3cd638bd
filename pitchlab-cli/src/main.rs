//! # pitchlab - Terminal Tuner and Pitch Monitor
//!
//! Drives the pitchlab-core analysis engine from the terminal.
//!
//! ## Architecture
//! - **Main Thread**: runs the frame loop, one tick per 16 ms refresh
//! - **Audio Thread**: owned by CPAL, feeds the engine's analysis node
//! - **Output**: a single status line redrawn in place on stdout; logs go to stderr

mod cli;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use cli::{Args, Command, RunArgs};
use pitchlab_core::{
    CaptureBackend, CaptureError, CpalBackend, EngineConfig, GuitarTuner, McLeodDetector,
    PausedAnalysis, PitchMonitor, SessionError, TickOutcome, ToneBackend, TunerReading,
    TuningStatus, note, tuning,
};
use std::io::{self, Write};
use std::thread;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// One display refresh.
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Half-width of the tuner gauge, in cents.
const GAUGE_RANGE_CENTS: f32 = 50.0;
const GAUGE_WIDTH: usize = 21;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Tunings => {
            list_tunings();
            Ok(())
        }
        Command::Tuner { tuning, run } => {
            let mut config = load_config(&run)?;
            if let Some(name) = tuning {
                config.tuning = name;
                config.validate()?;
            }
            match run.tone {
                Some(hz) => run_tuner(tone_backend(hz, &config), &config, run.frames),
                None => run_tuner(CpalBackend::new(config.sample_rate), &config, run.frames),
            }
        }
        Command::Monitor { pause_after, run } => {
            let config = load_config(&run)?;
            match run.tone {
                Some(hz) => run_monitor(tone_backend(hz, &config), &config, run.frames, pause_after),
                None => run_monitor(
                    CpalBackend::new(config.sample_rate),
                    &config,
                    run.frames,
                    pause_after,
                ),
            }
        }
    }
}

fn load_config(run: &RunArgs) -> Result<EngineConfig> {
    match &run.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn tone_backend(frequency: f32, config: &EngineConfig) -> ToneBackend {
    info!(frequency, "Using synthetic tone instead of the microphone");
    ToneBackend::new(frequency).with_sample_rate(config.sample_rate)
}

fn list_tunings() {
    for name in tuning::names() {
        let Some(tuning) = tuning::by_name(name) else {
            continue;
        };
        let strings: Vec<String> = tuning
            .strings()
            .iter()
            .map(|s| format!("{}:{}", s.string_number, s.target_note_name()))
            .collect();
        println!("{:<16} {}", name, strings.join(" "));
    }
}

fn run_tuner<B: CaptureBackend>(backend: B, config: &EngineConfig, frames: Option<u64>) -> Result<()> {
    let detector = McLeodDetector::new(config.tuner_frame_size);
    let mut tuner = GuitarTuner::new(backend, detector, config)?;
    start_or_explain(tuner.start())?;
    println!("Tuning: {} (Ctrl-C to quit)", tuner.state().tuning().name());

    let mut frame = 0u64;
    while frames.is_none_or(|limit| frame < limit) {
        let Some(handle) = tuner.request_tick() else {
            break;
        };
        thread::sleep(FRAME_INTERVAL);
        if let TickOutcome::Stopped(err) = tuner.tick(handle) {
            println!();
            return Err(capture_failure(err));
        }

        let line = match tuner.state().reading() {
            Some(reading) => tuner_line(reading, tuner.state().in_tune_cents()),
            None => "Play a string...".to_string(),
        };
        redraw(&line)?;
        frame += 1;
    }

    tuner.stop();
    println!();
    Ok(())
}

fn run_monitor<B: CaptureBackend>(
    backend: B,
    config: &EngineConfig,
    frames: Option<u64>,
    pause_after: Option<u64>,
) -> Result<()> {
    let detector = McLeodDetector::new(config.monitor_frame_size);
    let mut monitor = PitchMonitor::new(backend, detector, config);
    start_or_explain(monitor.start())?;
    println!("Monitoring pitch (Ctrl-C to quit)");

    let mut frame = 0u64;
    while frames.is_none_or(|limit| frame < limit) {
        if pause_after.is_some_and(|n| frame >= n) {
            let snapshot = monitor.pause()?;
            println!();
            print_paused(snapshot.as_ref());
            break;
        }

        let Some(handle) = monitor.request_tick() else {
            break;
        };
        thread::sleep(FRAME_INTERVAL);
        if let TickOutcome::Stopped(err) = monitor.tick(handle) {
            println!();
            return Err(capture_failure(err));
        }

        let state = monitor.state();
        let range = state.visible_range();
        let window = format!(
            "{}..{}",
            note::midi_to_note_name(range.min_midi.ceil() as i32),
            note::midi_to_note_name(range.max_midi.floor() as i32)
        );
        let line = match state.current() {
            Some(current) => format!(
                "{:<4} {:>8.2} Hz {:>+6.1} cents   window {}",
                current.note, current.frequency, current.cents, window
            ),
            None => format!("--                          window {}", window),
        };
        redraw(&line)?;
        frame += 1;
    }

    monitor.stop();
    Ok(())
}

fn start_or_explain(result: Result<(), SessionError>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(SessionError::Capture(err)) => Err(capture_failure(err)),
        Err(other) => Err(other.into()),
    }
}

fn capture_failure(err: CaptureError) -> anyhow::Error {
    eprintln!("{}", err.user_message());
    anyhow!(err)
}

fn tuner_line(reading: &TunerReading, in_tune_cents: f32) -> String {
    let status = match reading.status(in_tune_cents) {
        TuningStatus::Flat => "flat ",
        TuningStatus::InTune => "OK   ",
        TuningStatus::Sharp => "sharp",
    };
    format!(
        "String {} ({}) {:>8.2} Hz {:>+6.1} cents {} {}",
        reading.string.string_number,
        reading.string.target_note_name(),
        reading.frequency,
        reading.cents_off,
        gauge(reading.cents_off),
        status
    )
}

/// Text needle: `[----|----]` with `*` at the deviation, clamped to the ends.
fn gauge(cents: f32) -> String {
    let half = (GAUGE_WIDTH / 2) as f32;
    let offset = (cents / GAUGE_RANGE_CENTS).clamp(-1.0, 1.0) * half;
    let needle = (half + offset).round() as usize;
    let body: String = (0..GAUGE_WIDTH)
        .map(|i| match i {
            _ if i == needle => '*',
            _ if i == GAUGE_WIDTH / 2 => '|',
            _ => '-',
        })
        .collect();
    format!("[{}]", body)
}

fn print_paused(snapshot: Option<&PausedAnalysis>) {
    match snapshot {
        Some(analysis) => {
            println!(
                "Last note: {} at {:.2} Hz (target {:.2} Hz), {}",
                analysis.note,
                analysis.frequency,
                analysis.target_frequency,
                offset_text(analysis)
            );
        }
        None => println!("No pitch detected yet."),
    }
}

fn offset_text(analysis: &PausedAnalysis) -> String {
    if analysis.is_sharp() {
        format!("{:.1} cents sharp", analysis.cents)
    } else if analysis.is_flat() {
        format!("{:.1} cents flat", -analysis.cents)
    } else {
        "in tune".to_string()
    }
}

fn redraw(line: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    write!(stdout, "\r{:<72}", line)?;
    stdout.flush()?;
    Ok(())
}
