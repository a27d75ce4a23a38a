//! Routing of notes to hand colours.

use serde::{Deserialize, Serialize};

use crate::render::Rgb;

/// Hand colour settings. With `split` off every note uses `unified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorSettings {
    pub split: bool,
    pub left: Rgb,
    pub right: Rgb,
    pub unified: Rgb,
}

impl Default for ColorSettings {
    fn default() -> Self {
        Self {
            split: true,
            left: Rgb::from_u32(0xfb7185),
            right: Rgb::from_u32(0x22d3ee),
            unified: Rgb::from_u32(0xfbbf24),
        }
    }
}

/// How notes are assigned to hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitStrategy {
    /// Track 0 is the right hand, every other track the left.
    #[default]
    Tracks,
    /// Notes below the MIDI split point are the left hand.
    Point(u8),
}

pub fn color_by_track(track: u32, colors: &ColorSettings) -> Rgb {
    if !colors.split {
        return colors.unified;
    }
    if track == 0 {
        colors.right
    } else {
        colors.left
    }
}

pub fn color_by_midi(midi: u8, split_point: u8, colors: &ColorSettings) -> Rgb {
    if !colors.split {
        return colors.unified;
    }
    if midi < split_point {
        colors.left
    } else {
        colors.right
    }
}

pub fn note_color(track: u32, midi: u8, colors: &ColorSettings, strategy: SplitStrategy) -> Rgb {
    match strategy {
        SplitStrategy::Tracks => color_by_track(track, colors),
        SplitStrategy::Point(split_point) => color_by_midi(midi, split_point, colors),
    }
}
