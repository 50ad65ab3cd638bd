//! Command-line argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "pitchlab")]
#[command(about = "Real-time guitar tuner and pitch monitor", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Tune a guitar against the selected tuning
    Tuner {
        /// Tuning to use (see `pitchlab tunings`)
        #[arg(long, value_name = "NAME")]
        tuning: Option<String>,

        #[command(flatten)]
        run: RunArgs,
    },
    /// Follow the sung or played pitch over time
    Monitor {
        /// Pause after this many frames and print the analysis of the last note
        #[arg(long, value_name = "N")]
        pause_after: Option<u64>,

        #[command(flatten)]
        run: RunArgs,
    },
    /// List the built-in tunings
    Tunings,
}

/// Options shared by the analysis tools.
#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Analyse a synthetic sine tone instead of the microphone
    #[arg(long, value_name = "HZ")]
    pub tone: Option<f32>,

    /// Stop after this many frames (runs until interrupted otherwise)
    #[arg(long, value_name = "N")]
    pub frames: Option<u64>,

    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tuner_options() {
        let args = Args::parse_from(["pitchlab", "tuner", "--tuning", "drop_d", "--tone", "73.4"]);
        let Command::Tuner { tuning, run } = args.command else {
            panic!("expected tuner");
        };
        assert_eq!(tuning.as_deref(), Some("drop_d"));
        assert_eq!(run.tone, Some(73.4));
        assert!(run.frames.is_none());
    }

    #[test]
    fn parses_monitor_pause() {
        let args = Args::parse_from(["pitchlab", "monitor", "--frames", "90", "--pause-after", "60"]);
        let Command::Monitor { pause_after, run } = args.command else {
            panic!("expected monitor");
        };
        assert_eq!(pause_after, Some(60));
        assert_eq!(run.frames, Some(90));
    }
}
