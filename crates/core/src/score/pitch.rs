//! Conversions between scientific pitch names (`"C#4"`) and MIDI numbers.

use crate::{PianoError, Result};

const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Parses a pitch name such as `"C4"`, `"F#3"`, `"Bb2"` or `"C-1"` into a
/// MIDI note number.
pub fn midi_from_name(name: &str) -> Result<u8> {
    let invalid = || PianoError::InvalidPitch(name.to_string());
    let trimmed = name.trim();
    let mut chars = trimmed.chars();

    let letter = chars.next().ok_or_else(invalid)?;
    let pitch_class: i32 = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return Err(invalid()),
    };

    let rest = chars.as_str();
    let accidentals = rest
        .chars()
        .take_while(|c| matches!(c, '#' | 'b'))
        .count();
    let alteration: i32 = rest[..accidentals]
        .chars()
        .map(|c| if c == '#' { 1 } else { -1 })
        .sum();

    let octave: i32 = rest[accidentals..].parse().map_err(|_| invalid())?;
    let midi = (octave + 1) * 12 + pitch_class + alteration;
    u8::try_from(midi)
        .ok()
        .filter(|value| *value <= 127)
        .ok_or_else(invalid)
}

/// Formats a MIDI number using sharps, e.g. `61 -> "C#4"`. Values outside the
/// MIDI range produce `"Unknown"`.
pub fn note_name(midi: i32) -> String {
    if !(0..=127).contains(&midi) {
        return "Unknown".to_string();
    }
    let octave = midi / 12 - 1;
    format!("{}{}", SHARP_NAMES[(midi % 12) as usize], octave)
}
