//! Geometry of the falling-note view.

use crate::{timeline::Tick, ScoreNote};

/// Closeness of a falling note to the impact line: 1 touching it, 0 at the
/// top of the container. Clamped outside `[0, container_height]`.
pub fn proximity(bottom_px: f32, container_height: f32) -> f32 {
    if container_height <= 0.0 || !bottom_px.is_finite() {
        return 0.0;
    }
    (1.0 - bottom_px / container_height).clamp(0.0, 1.0)
}

/// Distance of a note's start above the impact line as a percentage of the
/// visible window. Negative once the note has started.
pub fn bottom_percent(note_start: Tick, tick: Tick, window_ticks: Tick) -> f64 {
    if window_ticks == 0 {
        return 0.0;
    }
    (note_start as f64 - tick as f64) / window_ticks as f64 * 100.0
}

/// Score notes sorted by start, with the longest duration cached so that
/// long notes that began before the window are still found.
#[derive(Debug, Clone, Default)]
pub struct WaterfallIndex {
    notes: Vec<ScoreNote>,
    max_duration: Tick,
}

impl WaterfallIndex {
    pub fn new(notes: &[ScoreNote]) -> Self {
        let mut notes = notes.to_vec();
        notes.sort_by_key(|note| note.start_tick);
        let max_duration = notes.iter().map(|note| note.duration_ticks).max().unwrap_or(0);
        Self {
            notes,
            max_duration,
        }
    }

    pub fn max_duration(&self) -> Tick {
        self.max_duration
    }

    /// Notes that overlap `[tick, tick + window_ticks]`: started no later than
    /// the window's end and not yet stopped at `tick`.
    pub fn visible_notes(&self, tick: Tick, window_ticks: Tick) -> Vec<&ScoreNote> {
        if self.notes.is_empty() {
            return Vec::new();
        }
        let horizon = tick.saturating_add(window_ticks);
        let first_current = self.notes.partition_point(|note| note.start_tick < tick);

        // Walk back over notes that started within one maximum duration.
        let lookback = tick.saturating_sub(self.max_duration);
        let mut start = first_current;
        while start > 0 && self.notes[start - 1].start_tick >= lookback {
            start -= 1;
        }

        self.notes[start..]
            .iter()
            .take_while(|note| note.start_tick <= horizon)
            .filter(|note| note.end_tick() > tick)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proximity_is_linear_and_clamped() {
        assert_eq!(proximity(0.0, 400.0), 1.0);
        assert_eq!(proximity(400.0, 400.0), 0.0);
        assert_eq!(proximity(200.0, 400.0), 0.5);
        assert_eq!(proximity(-50.0, 400.0), 1.0);
        assert_eq!(proximity(900.0, 400.0), 0.0);
        assert_eq!(proximity(10.0, 0.0), 0.0);
    }

    #[test]
    fn bottom_percent_tracks_distance() {
        assert_eq!(bottom_percent(1440, 0, 2880), 50.0);
        assert_eq!(bottom_percent(0, 1440, 2880), -50.0);
        assert_eq!(bottom_percent(10, 0, 0), 0.0);
    }

    #[test]
    fn long_note_started_before_window_is_visible() {
        let index = WaterfallIndex::new(&[ScoreNote::new("C4", 0, 100_000)]);
        let visible = index.visible_notes(50_000, 6 * 480);
        assert_eq!(visible.len(), 1);
    }

    #[test]
    fn returns_notes_inside_window_only() {
        let notes: Vec<ScoreNote> = (0..10)
            .map(|i| ScoreNote::new("C4", i * 100, 50))
            .collect();
        let index = WaterfallIndex::new(&notes);

        let visible = index.visible_notes(0, 250);
        let starts: Vec<Tick> = visible.iter().map(|n| n.start_tick).collect();
        assert_eq!(starts, vec![0, 100, 200]);

        // The note at 100 stopped at 150.
        let visible = index.visible_notes(160, 100);
        let starts: Vec<Tick> = visible.iter().map(|n| n.start_tick).collect();
        assert_eq!(starts, vec![200]);
    }

    #[test]
    fn empty_index_is_empty() {
        assert!(WaterfallIndex::default().visible_notes(0, 1000).is_empty());
    }
}
