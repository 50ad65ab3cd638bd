//! # Note Mapping Module
//!
//! Pure conversions between frequencies, MIDI note numbers, note names and
//! cents, based on 12-tone equal temperament with A4 = 440 Hz.
//!
//! ## Features
//! - Frequency ↔ continuous MIDI number conversions
//! - Note naming with sharps (e.g. "C#4")
//! - Cent deviation between a detected and a target frequency
//! - Integer note ranges for grid labelling

use std::ops::RangeInclusive;

/// Reference pitch for A4 in Hz.
pub const A4_FREQUENCY: f32 = 440.0;

/// MIDI note number of A4.
pub const A4_MIDI: f32 = 69.0;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Converts a frequency in Hz to a continuous MIDI note number.
///
/// Only defined for `frequency > 0`; the confidence gate upstream already
/// excludes invalid samples, so this function does not guard against it.
pub fn frequency_to_midi(frequency: f32) -> f32 {
    A4_MIDI + 12.0 * (frequency / A4_FREQUENCY).log2()
}

/// Converts a (possibly fractional) MIDI note number back to Hz.
pub fn midi_to_frequency(midi: f32) -> f32 {
    A4_FREQUENCY * 2.0_f32.powf((midi - A4_MIDI) / 12.0)
}

/// Gets the note name for an already-rounded MIDI note number.
///
/// # Examples
/// * `69` -> `"A4"`
/// * `60` -> `"C4"`
/// * `61` -> `"C#4"`
pub fn midi_to_note_name(midi: i32) -> String {
    let octave = midi.div_euclid(12) - 1;
    let index = midi.rem_euclid(12) as usize;
    format!("{}{}", NOTE_NAMES[index], octave)
}

/// Converts a frequency to the name of the nearest equal-tempered note.
///
/// Returns an empty string for non-positive frequencies.
pub fn frequency_to_note_name(frequency: f32) -> String {
    if frequency <= 0.0 {
        return String::new();
    }
    midi_to_note_name(frequency_to_midi(frequency).round() as i32)
}

/// Calculates how many cents a frequency is off from a target frequency.
///
/// Cents are a logarithmic unit of pitch measurement where:
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values indicate sharpness, negative values indicate flatness
pub fn cents_off_from_pitch(frequency: f32, target_frequency: f32) -> f32 {
    1200.0 * (frequency / target_frequency).log2()
}

/// Integer MIDI note numbers inside `[ceil(min_midi), floor(max_midi)]`.
///
/// The returned range is finite and `Clone`, so a renderer can walk it as
/// many times as it needs. It is empty when `min_midi > max_midi`.
pub fn midi_note_range(min_midi: f32, max_midi: f32) -> RangeInclusive<i32> {
    let start = min_midi.ceil() as i32;
    let end = max_midi.floor() as i32;
    start..=end
}

/// The equal-tempered note nearest to a detected frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestNote {
    /// Rounded MIDI note number.
    pub midi: i32,
    /// Note name, e.g. "A4".
    pub name: String,
    /// Exact frequency of the note in Hz.
    pub frequency: f32,
    /// Deviation of the detected frequency from `frequency`, in cents.
    pub cents: f32,
}

/// Finds the closest equal-tempered note to a given frequency.
///
/// Returns `None` for non-positive or non-finite frequencies.
pub fn nearest_note(frequency: f32) -> Option<NearestNote> {
    if !(frequency > 0.0 && frequency.is_finite()) {
        return None;
    }
    let midi = frequency_to_midi(frequency).round() as i32;
    let target = midi_to_frequency(midi as f32);
    Some(NearestNote {
        midi,
        name: midi_to_note_name(midi),
        frequency: target,
        cents: cents_off_from_pitch(frequency, target),
    })
}
