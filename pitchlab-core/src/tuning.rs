//! # Tuning Module
//!
//! Instrument tunings and nearest-target lookup for the guitar tuner.
//!
//! A [`Tuning`] is a named, ordered, non-empty set of [`GuitarString`]s. The
//! tuner snaps every detected pitch to the closest string of the active
//! tuning and measures the deviation against that string's target pitch.
//!
//! ## Features
//! - Built-in registry (standard, drop D, half-step down, open G, DADGAD)
//! - Custom tunings loaded through serde
//! - Deterministic tie-breaking between equidistant strings

use crate::error::ConfigError;
use crate::note;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single string of a tuned instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuitarString {
    /// 6 is the thickest, 1 is the thinnest.
    pub string_number: u8,
    /// Short display name, e.g. "E", "A", "e".
    pub name: String,
    /// MIDI note number of the perfectly tuned string.
    pub target_midi: i32,
}

impl GuitarString {
    pub fn new(string_number: u8, name: &str, target_midi: i32) -> Self {
        Self {
            string_number,
            name: name.to_string(),
            target_midi,
        }
    }

    /// Frequency of the perfectly tuned string in Hz.
    pub fn target_frequency(&self) -> f32 {
        note::midi_to_frequency(self.target_midi as f32)
    }

    /// Scientific pitch name of the target, e.g. "E2".
    pub fn target_note_name(&self) -> String {
        note::midi_to_note_name(self.target_midi)
    }
}

/// A named, ordered, non-empty collection of strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTuning")]
pub struct Tuning {
    name: String,
    strings: Vec<GuitarString>,
}

#[derive(Deserialize)]
struct RawTuning {
    name: String,
    strings: Vec<GuitarString>,
}

impl TryFrom<RawTuning> for Tuning {
    type Error = ConfigError;

    fn try_from(raw: RawTuning) -> Result<Self, Self::Error> {
        Tuning::new(raw.name, raw.strings)
    }
}

impl Tuning {
    /// Creates a tuning, rejecting an empty string set.
    pub fn new(name: impl Into<String>, strings: Vec<GuitarString>) -> Result<Self, ConfigError> {
        let name = name.into();
        if strings.is_empty() {
            return Err(ConfigError::EmptyTuning(name));
        }
        Ok(Self { name, strings })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Strings in canonical order.
    pub fn strings(&self) -> &[GuitarString] {
        &self.strings
    }

    /// Finds the string whose target is closest to `detected_midi`.
    ///
    /// When two targets are exactly equidistant the string with the lower
    /// string number wins, so the result does not depend on the order the
    /// strings were listed in. MIDI 42.5 in standard tuning, halfway between
    /// E2 and A2, resolves to the A string (5) rather than low E (6).
    pub fn find_closest_string(&self, detected_midi: f32) -> &GuitarString {
        // Non-empty by construction.
        let mut closest = &self.strings[0];
        let mut smallest = (closest.target_midi as f32 - detected_midi).abs();

        for string in &self.strings[1..] {
            let difference = (string.target_midi as f32 - detected_midi).abs();
            let tie_wins = difference == smallest && string.string_number < closest.string_number;
            if difference < smallest || tie_wins {
                smallest = difference;
                closest = string;
            }
        }
        closest
    }

    /// Like [`Tuning::find_closest_string`], but gives up when the closest
    /// target is more than `max_semitones` away or the pitch is not positive.
    pub fn find_closest_string_within(
        &self,
        detected_midi: f32,
        max_semitones: f32,
    ) -> Option<&GuitarString> {
        if detected_midi <= 0.0 {
            return None;
        }
        let closest = self.find_closest_string(detected_midi);
        if (closest.target_midi as f32 - detected_midi).abs() > max_semitones {
            None
        } else {
            Some(closest)
        }
    }
}

fn six_string(name: &str, strings: [(&str, i32); 6]) -> Tuning {
    let strings = strings
        .iter()
        .enumerate()
        .map(|(i, &(label, midi))| GuitarString::new(6 - i as u8, label, midi))
        .collect();
    Tuning {
        name: name.to_string(),
        strings,
    }
}

/// Built-in tunings, keyed by name.
static TUNINGS: Lazy<BTreeMap<&'static str, Tuning>> = Lazy::new(|| {
    let mut map = BTreeMap::new();
    map.insert(
        "standard",
        six_string(
            "standard",
            [("E", 40), ("A", 45), ("D", 50), ("G", 55), ("B", 59), ("e", 64)],
        ),
    );
    map.insert(
        "drop_d",
        six_string(
            "drop_d",
            [("D", 38), ("A", 45), ("D", 50), ("G", 55), ("B", 59), ("e", 64)],
        ),
    );
    map.insert(
        "half_step_down",
        six_string(
            "half_step_down",
            [("Eb", 39), ("Ab", 44), ("Db", 49), ("Gb", 54), ("Bb", 58), ("eb", 63)],
        ),
    );
    map.insert(
        "open_g",
        six_string(
            "open_g",
            [("D", 38), ("G", 43), ("D", 50), ("G", 55), ("B", 59), ("d", 62)],
        ),
    );
    map.insert(
        "dadgad",
        six_string(
            "dadgad",
            [("D", 38), ("A", 45), ("D", 50), ("G", 55), ("A", 57), ("d", 62)],
        ),
    );
    map
});

/// Standard EADGBe tuning.
pub fn standard() -> &'static Tuning {
    &TUNINGS["standard"]
}

/// Looks up a built-in tuning by name.
pub fn by_name(name: &str) -> Option<&'static Tuning> {
    TUNINGS.get(name)
}

/// Names of all built-in tunings, sorted.
pub fn names() -> impl Iterator<Item = &'static str> {
    TUNINGS.keys().copied()
}
