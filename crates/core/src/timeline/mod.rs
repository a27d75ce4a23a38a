//! Tick-indexed event timeline built once per loaded score.
//!
//! The timeline answers two questions: which notes sound at a given tick
//! (replayed from tick 0, the canonical reconstruction) and which notes are
//! about to start (the preview window). Everything is expressed in ticks so
//! that positions stay valid across tempo and playback-rate changes.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::{Score, ScoreNote};

/// Discrete score time at the score's PPQ resolution.
pub type Tick = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Start,
    Stop,
}

/// A note boundary derived from the score. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEvent {
    pub tick: Tick,
    pub kind: EventKind,
    pub pitch: String,
    pub track: u32,
    pub velocity: u8,
}

impl ScoreEvent {
    pub fn voice(&self) -> VoiceKey {
        VoiceKey {
            pitch: self.pitch.clone(),
            track: self.track,
        }
    }
}

/// Composite key identifying one voice: a pitch on a given track.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoiceKey {
    pub pitch: String,
    pub track: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveNote {
    pub pitch: String,
    pub track: u32,
    pub velocity: u8,
    pub start_tick: Tick,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewNote {
    pub pitch: String,
    pub track: u32,
    pub start_tick: Tick,
}

/// The set of currently sounding notes keyed by voice.
///
/// A `start` for a voice that is already sounding replaces its record, so a
/// re-struck note restarts rather than stacking.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ActiveNoteSet {
    notes: BTreeMap<VoiceKey, ActiveNote>,
}

impl ActiveNoteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a single event; returns whether it was a start or a stop that
    /// removed a sounding voice.
    pub fn apply(&mut self, event: &ScoreEvent) -> bool {
        match event.kind {
            EventKind::Start => {
                self.notes.insert(
                    event.voice(),
                    ActiveNote {
                        pitch: event.pitch.clone(),
                        track: event.track,
                        velocity: event.velocity,
                        start_tick: event.tick,
                    },
                );
                true
            }
            EventKind::Stop => self.notes.remove(&event.voice()).is_some(),
        }
    }

    pub fn clear(&mut self) {
        self.notes.clear();
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn contains(&self, pitch: &str, track: u32) -> bool {
        self.notes.contains_key(&VoiceKey {
            pitch: pitch.to_string(),
            track,
        })
    }

    pub fn get(&self, key: &VoiceKey) -> Option<&ActiveNote> {
        self.notes.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveNote> {
        self.notes.values()
    }

    /// Owned copy of the sounding notes ordered by voice key.
    pub fn to_vec(&self) -> Vec<ActiveNote> {
        self.notes.values().cloned().collect()
    }
}

/// Tick -> events map with a cached, sorted array of the distinct ticks.
#[derive(Debug, Clone)]
pub struct Timeline {
    events: HashMap<Tick, Vec<ScoreEvent>>,
    ticks: Vec<Tick>,
    tracks: BTreeMap<u32, Vec<ScoreNote>>,
    end_tick: Tick,
    ppq: u32,
    bpm: f64,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::empty()
    }
}

impl Timeline {
    /// A timeline with no events. Every query on it returns an empty result.
    pub fn empty() -> Self {
        Self {
            events: HashMap::new(),
            ticks: Vec::new(),
            tracks: BTreeMap::new(),
            end_tick: 0,
            ppq: crate::score::DEFAULT_PPQ,
            bpm: crate::score::DEFAULT_BPM,
        }
    }

    /// Registers a start and a stop event per note.
    ///
    /// Zero-length notes are skipped since no tick satisfies
    /// `start <= t < start`. Within one tick stops sort before starts.
    pub fn build(score: &Score) -> Self {
        let mut events: HashMap<Tick, Vec<ScoreEvent>> = HashMap::new();
        let mut tracks: BTreeMap<u32, Vec<ScoreNote>> = BTreeMap::new();
        let mut skipped = 0usize;

        for note in &score.notes {
            if note.duration_ticks == 0 {
                skipped += 1;
                continue;
            }

            events.entry(note.start_tick).or_default().push(ScoreEvent {
                tick: note.start_tick,
                kind: EventKind::Start,
                pitch: note.pitch.clone(),
                track: note.track,
                velocity: note.velocity,
            });
            events.entry(note.end_tick()).or_default().push(ScoreEvent {
                tick: note.end_tick(),
                kind: EventKind::Stop,
                pitch: note.pitch.clone(),
                track: note.track,
                velocity: 0,
            });

            tracks.entry(note.track).or_default().push(note.clone());
        }

        for bucket in events.values_mut() {
            // Stable: preserves score order among events of the same kind.
            bucket.sort_by_key(|event| event.kind == EventKind::Start);
        }
        for notes in tracks.values_mut() {
            notes.sort_by_key(|note| note.start_tick);
        }

        let mut ticks: Vec<Tick> = events.keys().copied().collect();
        ticks.sort_unstable();

        if skipped > 0 {
            tracing::debug!(skipped, "ignored zero-length notes");
        }
        tracing::debug!(
            notes = score.notes.len() - skipped,
            distinct_ticks = ticks.len(),
            "timeline built"
        );

        Self {
            end_tick: ticks.last().copied().unwrap_or(0),
            events,
            ticks,
            tracks,
            ppq: score.ppq.max(1),
            bpm: score.bpm,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn end_tick(&self) -> Tick {
        self.end_tick
    }

    pub fn ppq(&self) -> u32 {
        self.ppq
    }

    /// Base tempo of the score, the fixed reference for displayed time.
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Sorted distinct ticks that carry at least one event.
    pub fn ticks(&self) -> &[Tick] {
        &self.ticks
    }

    pub fn events_at(&self, tick: Tick) -> &[ScoreEvent] {
        self.events.get(&tick).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Event ticks in `(after, through]`, or `[0, through]` when `after` is
    /// `None` (nothing processed yet).
    pub fn ticks_in(&self, after: Option<Tick>, through: Tick) -> &[Tick] {
        let lo = match after {
            Some(after) => self.ticks.partition_point(|&t| t <= after),
            None => 0,
        };
        let hi = self.ticks.partition_point(|&t| t <= through);
        if lo >= hi {
            &[]
        } else {
            &self.ticks[lo..hi]
        }
    }

    /// Canonical reconstruction: replays every event from tick 0 up to and
    /// including the greatest event tick `<= tick`.
    pub fn active_at(&self, tick: Tick) -> ActiveNoteSet {
        let mut active = ActiveNoteSet::new();
        let upto = self.ticks.partition_point(|&t| t <= tick);
        for key in &self.ticks[..upto] {
            for event in self.events_at(*key) {
                active.apply(event);
            }
        }
        active
    }

    /// Notes starting in `(tick, tick + window_ticks]`, ordered by track and
    /// then start tick.
    pub fn preview_window(&self, tick: Tick, window_ticks: Tick) -> Vec<PreviewNote> {
        let horizon = tick.saturating_add(window_ticks);
        let mut preview = Vec::new();

        for notes in self.tracks.values() {
            let first = notes.partition_point(|note| note.start_tick <= tick);
            for note in &notes[first..] {
                if note.start_tick > horizon {
                    break;
                }
                preview.push(PreviewNote {
                    pitch: note.pitch.clone(),
                    track: note.track,
                    start_tick: note.start_tick,
                });
            }
        }

        preview
    }
}

/// Converts ticks to seconds at a fixed tempo.
pub fn ticks_to_seconds(ticks: Tick, ppq: u32, bpm: f64) -> f64 {
    if ppq == 0 || bpm <= 0.0 {
        return 0.0;
    }
    ticks as f64 / ppq as f64 * 60.0 / bpm
}

/// Converts seconds to whole ticks at a fixed tempo, rounding down.
pub fn seconds_to_ticks(seconds: f64, ppq: u32, bpm: f64) -> Tick {
    if !seconds.is_finite() || seconds <= 0.0 || bpm <= 0.0 {
        return 0;
    }
    (seconds * bpm / 60.0 * ppq as f64).floor() as Tick
}

/// Formats seconds as `M:SS`, flooring. Negative or non-finite input reads
/// as `0:00`.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}
