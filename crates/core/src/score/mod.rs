//! Normalised score shape consumed by the timeline.
//!
//! Whatever the source format (MIDI file, hand-authored melody or a score
//! markup converted by an external parser), the surrounding application hands
//! the core a flat list of tick-stamped notes plus the tick resolution and a
//! base tempo. This module owns that shape and its validation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{PianoError, Result};

mod pitch;

pub use pitch::{midi_from_name, note_name};

/// Tick resolution assumed when a score does not declare one.
pub const DEFAULT_PPQ: u32 = 480;
/// Tempo assumed when a score does not declare one.
pub const DEFAULT_BPM: f64 = 120.0;

/// A single note of the flattened score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreNote {
    pub pitch: String,
    pub start_tick: u64,
    pub duration_ticks: u64,
    #[serde(default = "default_velocity")]
    pub velocity: u8,
    /// Track index; track 0 is conventionally the right hand.
    #[serde(default)]
    pub track: u32,
}

impl ScoreNote {
    pub fn new(pitch: impl Into<String>, start_tick: u64, duration_ticks: u64) -> Self {
        Self {
            pitch: pitch.into(),
            start_tick,
            duration_ticks,
            velocity: default_velocity(),
            track: 0,
        }
    }

    pub fn with_track(mut self, track: u32) -> Self {
        self.track = track;
        self
    }

    pub fn with_velocity(mut self, velocity: u8) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn end_tick(&self) -> u64 {
        self.start_tick.saturating_add(self.duration_ticks)
    }
}

fn default_velocity() -> u8 {
    100
}

fn default_ppq() -> u32 {
    DEFAULT_PPQ
}

fn default_bpm() -> f64 {
    DEFAULT_BPM
}

/// Flat, tick-stamped note list with its timing metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_ppq")]
    pub ppq: u32,
    #[serde(default = "default_bpm")]
    pub bpm: f64,
    #[serde(default)]
    pub notes: Vec<ScoreNote>,
}

impl Default for Score {
    fn default() -> Self {
        Self {
            title: String::new(),
            ppq: DEFAULT_PPQ,
            bpm: DEFAULT_BPM,
            notes: Vec::new(),
        }
    }
}

impl Score {
    pub fn new(ppq: u32, bpm: f64, notes: Vec<ScoreNote>) -> Self {
        Self {
            title: String::new(),
            ppq,
            bpm,
            notes,
        }
    }

    /// Decodes and validates a JSON score.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let score: Score = serde_json::from_str(json)?;
        score.validate()?;
        Ok(score)
    }

    /// Reads, decodes and validates a JSON score file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Checks the timing metadata and every note. The first violation wins.
    pub fn validate(&self) -> Result<()> {
        if self.ppq == 0 {
            return Err(PianoError::InvalidScore("ppq must be positive".into()));
        }
        if !self.bpm.is_finite() || self.bpm <= 0.0 {
            return Err(PianoError::InvalidScore(format!(
                "bpm must be a positive number, got {}",
                self.bpm
            )));
        }
        for (index, note) in self.notes.iter().enumerate() {
            if note.velocity > 127 {
                return Err(PianoError::InvalidScore(format!(
                    "note {index} has velocity {} outside 0..=127",
                    note.velocity
                )));
            }
            midi_from_name(&note.pitch)?;
        }
        Ok(())
    }

    /// Tick at which the last note stops.
    pub fn end_tick(&self) -> u64 {
        self.notes.iter().map(ScoreNote::end_tick).max().unwrap_or(0)
    }

    pub fn track_count(&self) -> usize {
        self.notes
            .iter()
            .map(|note| note.track as usize + 1)
            .max()
            .unwrap_or(0)
    }
}
