//! # Pitch History Module
//!
//! Rolling record of recent readings for the pitch monitor, plus the
//! adaptive 12-semitone window the monitor's graph is drawn in.
//!
//! ## Features
//! - Fixed-capacity FIFO history with silence markers
//! - Visible range that recentres only when a reading leaves it
//! - One-shot "paused analysis" of the last valid reading

use crate::note;
use std::collections::VecDeque;

/// Number of readings kept by default.
pub const DEFAULT_HISTORY_CAPACITY: usize = 500;

/// Width of the visible window in semitones.
pub const DEFAULT_WINDOW_SEMITONES: f32 = 12.0;

/// One slot of the history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HistoryEntry {
    /// A valid detection, as a continuous MIDI number.
    Pitch(f32),
    /// No detection on this tick.
    Silence,
}

impl HistoryEntry {
    /// Raw value used by renderers for a silent slot.
    pub const SILENCE_SENTINEL: f32 = 0.0;

    pub fn midi(self) -> Option<f32> {
        match self {
            HistoryEntry::Pitch(midi) => Some(midi),
            HistoryEntry::Silence => None,
        }
    }

    /// The MIDI value, or [`HistoryEntry::SILENCE_SENTINEL`] for silence.
    pub fn to_raw(self) -> f32 {
        self.midi().unwrap_or(Self::SILENCE_SENTINEL)
    }

    pub fn is_silence(self) -> bool {
        matches!(self, HistoryEntry::Silence)
    }
}

/// The MIDI interval currently shown on the monitor's vertical axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleRange {
    pub min_midi: f32,
    pub max_midi: f32,
}

impl Default for VisibleRange {
    /// C3 to C4.
    fn default() -> Self {
        Self {
            min_midi: 48.0,
            max_midi: 60.0,
        }
    }
}

impl VisibleRange {
    /// A window of `width` semitones centred on `midi`.
    pub fn centred_on(midi: f32, width: f32) -> Self {
        Self {
            min_midi: midi - width / 2.0,
            max_midi: midi + width / 2.0,
        }
    }

    pub fn contains(&self, midi: f32) -> bool {
        midi >= self.min_midi && midi <= self.max_midi
    }

    pub fn span(&self) -> f32 {
        self.max_midi - self.min_midi
    }

    /// Integer notes inside the window, for grid lines and labels.
    pub fn grid_notes(&self) -> std::ops::RangeInclusive<i32> {
        note::midi_note_range(self.min_midi, self.max_midi)
    }
}

/// Result of pausing the monitor: what the last valid reading was.
#[derive(Debug, Clone, PartialEq)]
pub struct PausedAnalysis {
    /// Name of the nearest note, e.g. "A4".
    pub note: String,
    /// Frequency of the reading itself.
    pub frequency: f32,
    /// Exact frequency of the nearest note.
    pub target_frequency: f32,
    /// Offset from the nearest note (positive = sharp).
    pub cents: f32,
}

impl PausedAnalysis {
    fn from_midi(midi: f32) -> Option<Self> {
        let frequency = note::midi_to_frequency(midi);
        let nearest = note::nearest_note(frequency)?;
        Some(Self {
            note: nearest.name,
            frequency,
            target_frequency: nearest.frequency,
            cents: nearest.cents,
        })
    }

    /// Above the target note. An exact match is neither sharp nor flat.
    pub fn is_sharp(&self) -> bool {
        self.cents > 0.0
    }

    pub fn is_flat(&self) -> bool {
        self.cents < 0.0
    }
}

/// Fixed-capacity history of readings with an adaptive visible window.
#[derive(Debug, Clone)]
pub struct PitchHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
    window_semitones: f32,
    range: VisibleRange,
}

impl Default for PitchHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY, DEFAULT_WINDOW_SEMITONES)
    }
}

impl PitchHistory {
    pub fn new(capacity: usize, window_semitones: f32) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
            window_semitones,
            range: VisibleRange::default(),
        }
    }

    /// Records a valid detection and recentres the window if it fell outside.
    ///
    /// Non-positive or non-finite values cannot be told apart from the
    /// silence sentinel and are recorded as silence.
    pub fn push_pitch(&mut self, midi: f32) {
        if !(midi > 0.0 && midi.is_finite()) {
            self.push_silence();
            return;
        }
        self.push(HistoryEntry::Pitch(midi));
        if !self.range.contains(midi) {
            self.range = VisibleRange::centred_on(midi, self.window_semitones);
        }
    }

    /// Records a tick without a detection. Never moves the window.
    pub fn push_silence(&mut self) {
        self.push(HistoryEntry::Silence);
    }

    fn push(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Oldest first.
    pub fn entries(&self) -> impl ExactSizeIterator<Item = HistoryEntry> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the buffer has filled up to capacity.
    pub fn is_warmed_up(&self) -> bool {
        self.entries.len() == self.capacity
    }

    pub fn visible_range(&self) -> VisibleRange {
        self.range
    }

    /// Most recent valid reading, if any.
    pub fn last_pitch(&self) -> Option<f32> {
        self.entries.iter().rev().find_map(|entry| entry.midi())
    }

    /// Analysis of the most recent valid reading; `None` during total silence.
    pub fn paused_snapshot(&self) -> Option<PausedAnalysis> {
        self.last_pitch().and_then(PausedAnalysis::from_midi)
    }

    /// Empties the history and restores the default window.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.range = VisibleRange::default();
    }
}
