//! Pixel geometry of the 88-key keyboard.
//!
//! Key positions are fixed per layout, so neighbour relations and black-key
//! cut-outs are computed once into index tables instead of being searched
//! for on every render.

use serde::Serialize;

pub const LOWEST_KEY: u8 = 21;
pub const HIGHEST_KEY: u8 = 108;
pub const KEY_COUNT: usize = (HIGHEST_KEY - LOWEST_KEY) as usize + 1;

/// Seven 24px white keys.
pub const OCTAVE_WIDTH: f32 = 168.0;
pub const WHITE_KEY_WIDTH: f32 = 24.0;
pub const BLACK_KEY_WIDTH: f32 = 14.0;
/// Left margin before C1.
pub const SCREEN_OFFSET: f32 = 48.0;
/// Keyboard width plus margins at a scale of 1.
pub const BASE_PIANO_WIDTH: f32 = 1248.0 + 48.0;

/// Left edge of each pitch class relative to its octave's C.
const NOTE_OFFSETS: [f32; 12] = [
    0.0, 15.0, 24.0, 43.0, 48.0, 72.0, 85.0, 96.0, 113.0, 120.0, 141.0, 144.0,
];
const BLACK_CLASSES: [u8; 5] = [1, 3, 6, 8, 10];
/// Extra clearance added to a cut-out.
const CUT_MARGIN: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KeyGeometry {
    pub midi: u8,
    pub left: f32,
    pub width: f32,
    pub is_black: bool,
    /// Octave counted from C1.
    pub octave: i32,
    /// Pitch class, 0 = C.
    pub note_index: u8,
}

impl KeyGeometry {
    pub fn center(&self) -> f32 {
        self.left + self.width / 2.0
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }
}

/// Horizontal position of any MIDI key.
pub fn key_position(midi: u8) -> KeyGeometry {
    let relative = midi as i32 - 24;
    let octave = relative.div_euclid(12);
    let note_index = relative.rem_euclid(12) as u8;
    let is_black = BLACK_CLASSES.contains(&note_index);

    KeyGeometry {
        midi,
        left: octave as f32 * OCTAVE_WIDTH + NOTE_OFFSETS[note_index as usize] + SCREEN_OFFSET,
        width: if is_black {
            BLACK_KEY_WIDTH
        } else {
            WHITE_KEY_WIDTH
        },
        is_black,
        octave,
        note_index,
    }
}

/// Widths of a white key hidden under its black neighbours.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct KeyCuts {
    pub left: f32,
    pub right: f32,
}

/// Arena of the 88 keys with precomputed adjacency and cut tables.
#[derive(Debug, Clone)]
pub struct KeyboardLayout {
    keys: Vec<KeyGeometry>,
    neighbours: Vec<(Option<usize>, Option<usize>)>,
    cuts: Vec<KeyCuts>,
}

impl Default for KeyboardLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardLayout {
    pub fn new() -> Self {
        let keys: Vec<KeyGeometry> = (LOWEST_KEY..=HIGHEST_KEY).map(key_position).collect();
        let neighbours: Vec<(Option<usize>, Option<usize>)> = (0..keys.len())
            .map(|i| (i.checked_sub(1), (i + 1 < keys.len()).then_some(i + 1)))
            .collect();

        let cuts = keys
            .iter()
            .zip(&neighbours)
            .map(|(key, &(left, right))| {
                if key.is_black {
                    return KeyCuts::default();
                }
                let mut cuts = KeyCuts::default();
                if let Some(prev) = left.map(|i| &keys[i]).filter(|k| k.is_black) {
                    if prev.right() > key.left {
                        cuts.left = prev.right() - key.left + CUT_MARGIN;
                    }
                }
                if let Some(next) = right.map(|i| &keys[i]).filter(|k| k.is_black) {
                    if key.right() > next.left {
                        cuts.right = key.right() - next.left + CUT_MARGIN;
                    }
                }
                cuts
            })
            .collect();

        Self {
            keys,
            neighbours,
            cuts,
        }
    }

    pub fn keys(&self) -> &[KeyGeometry] {
        &self.keys
    }

    pub fn index_of(&self, midi: u8) -> Option<usize> {
        (LOWEST_KEY..=HIGHEST_KEY)
            .contains(&midi)
            .then(|| (midi - LOWEST_KEY) as usize)
    }

    pub fn key(&self, midi: u8) -> Option<&KeyGeometry> {
        self.index_of(midi).map(|i| &self.keys[i])
    }

    /// Left and right neighbour indices of the key at `index`.
    pub fn neighbours(&self, index: usize) -> (Option<usize>, Option<usize>) {
        self.neighbours.get(index).copied().unwrap_or((None, None))
    }

    pub fn cuts(&self, midi: u8) -> KeyCuts {
        self.index_of(midi)
            .map(|i| self.cuts[i])
            .unwrap_or_default()
    }

    /// Right edge of C8.
    pub fn total_width(&self) -> f32 {
        self.keys.last().map(KeyGeometry::right).unwrap_or(0.0)
    }
}

/// Scale factor fitting the keyboard into `window_width`, never below 0.5.
pub fn calculate_keyboard_scale(window_width: f32, base_width: f32) -> f32 {
    if window_width < base_width {
        (window_width / base_width).max(0.5)
    } else {
        1.0
    }
}
