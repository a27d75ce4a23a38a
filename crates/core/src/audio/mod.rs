use std::fmt;

use crate::{timeline::Tick, PianoError, Result, Score, ScoreNote};

/// Boundary to the external audio engine that owns the transport clock.
///
/// The core never synthesises sound: it reads the elapsed tick count, starts
/// and pauses the transport, assigns absolute positions and scales the tempo
/// for playback-rate changes.
pub trait AudioEngine {
    /// Prepares the engine for a new score (tick resolution, base tempo and
    /// the notes it should schedule on its sampler).
    fn load(&mut self, score: &Score) -> Result<()>;

    /// Elapsed transport position in (possibly fractional) ticks.
    fn ticks(&self) -> Result<f64>;

    fn is_started(&self) -> bool;

    fn start(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    /// Halts the transport and rewinds it to tick 0.
    fn stop(&mut self) -> Result<()>;

    /// Absolute position assignment (seek).
    fn set_ticks(&mut self, ticks: Tick) -> Result<()>;

    fn bpm(&self) -> f64;

    fn set_bpm(&mut self, bpm: f64) -> Result<()>;

    /// Wall-clock duration of `ticks` at the engine's current tempo.
    fn ticks_to_seconds(&self, ticks: Tick) -> f64;

    /// Drops scheduled notes and sampler resources.
    fn release(&mut self);
}

/// Sound source driven by the audio engine.
pub trait Sampler {
    fn trigger(&mut self, pitch: &str, duration_secs: f64, velocity: u8);

    fn release_all(&mut self);
}

/// Sampler that discards every trigger.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSampler;

impl Sampler for NullSampler {
    fn trigger(&mut self, _pitch: &str, _duration_secs: f64, _velocity: u8) {}

    fn release_all(&mut self) {}
}

/// Software transport used for headless sessions and tests.
///
/// Time only moves when the host calls [`ClockEngine::advance`] with elapsed
/// wall-clock seconds; the tick delta scales with the current BPM so a
/// playback-rate change alters speed but never tick positions.
pub struct ClockEngine {
    ticks: f64,
    bpm: f64,
    ppq: u32,
    started: bool,
    part: Vec<ScoreNote>,
    sampler: Box<dyn Sampler>,
}

impl ClockEngine {
    pub fn new() -> Self {
        Self::with_sampler(Box::new(NullSampler))
    }

    pub fn with_sampler(sampler: Box<dyn Sampler>) -> Self {
        Self {
            ticks: 0.0,
            bpm: crate::score::DEFAULT_BPM,
            ppq: crate::score::DEFAULT_PPQ,
            started: false,
            part: Vec::new(),
            sampler,
        }
    }

    pub fn ppq(&self) -> u32 {
        self.ppq
    }

    /// Advances the transport by `seconds` of wall-clock time and triggers
    /// every scheduled note whose start falls in the covered range.
    pub fn advance(&mut self, seconds: f64) {
        if !self.started || !seconds.is_finite() || seconds <= 0.0 {
            return;
        }

        let from = self.ticks;
        let to = from + seconds * self.bpm / 60.0 * self.ppq as f64;
        let first = self
            .part
            .partition_point(|note| (note.start_tick as f64) < from);

        for note in &self.part[first..] {
            if note.start_tick as f64 >= to {
                break;
            }
            let duration = self.ticks_to_seconds(note.duration_ticks);
            self.sampler.trigger(&note.pitch, duration, note.velocity);
        }

        self.ticks = to;
    }
}

impl Default for ClockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEngine for ClockEngine {
    fn load(&mut self, score: &Score) -> Result<()> {
        self.sampler.release_all();
        self.started = false;
        self.ticks = 0.0;
        self.ppq = score.ppq.max(1);
        self.bpm = score.bpm;
        self.part = score
            .notes
            .iter()
            .filter(|note| note.duration_ticks > 0)
            .cloned()
            .collect();
        self.part.sort_by_key(|note| note.start_tick);
        Ok(())
    }

    fn ticks(&self) -> Result<f64> {
        Ok(self.ticks)
    }

    fn is_started(&self) -> bool {
        self.started
    }

    fn start(&mut self) -> Result<()> {
        self.started = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.started = false;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.started = false;
        self.ticks = 0.0;
        self.sampler.release_all();
        Ok(())
    }

    fn set_ticks(&mut self, ticks: Tick) -> Result<()> {
        self.ticks = ticks as f64;
        Ok(())
    }

    fn bpm(&self) -> f64 {
        self.bpm
    }

    fn set_bpm(&mut self, bpm: f64) -> Result<()> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(PianoError::Audio(format!("tempo must be positive, got {bpm}")));
        }
        self.bpm = bpm;
        Ok(())
    }

    fn ticks_to_seconds(&self, ticks: Tick) -> f64 {
        crate::timeline::ticks_to_seconds(ticks, self.ppq, self.bpm)
    }

    fn release(&mut self) {
        self.sampler.release_all();
        self.part.clear();
        self.started = false;
    }
}

impl fmt::Debug for ClockEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockEngine")
            .field("ticks", &self.ticks)
            .field("bpm", &self.bpm)
            .field("ppq", &self.ppq)
            .field("started", &self.started)
            .field("part", &self.part.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    #[derive(Default, Clone)]
    struct RecordingSampler {
        hits: Rc<RefCell<Vec<(String, f64)>>>,
        releases: Rc<RefCell<usize>>,
    }

    impl Sampler for RecordingSampler {
        fn trigger(&mut self, pitch: &str, duration_secs: f64, _velocity: u8) {
            self.hits.borrow_mut().push((pitch.to_string(), duration_secs));
        }

        fn release_all(&mut self) {
            *self.releases.borrow_mut() += 1;
        }
    }

    fn score() -> Score {
        Score::new(
            480,
            120.0,
            vec![ScoreNote::new("C4", 0, 480), ScoreNote::new("E4", 960, 480)],
        )
    }

    #[test]
    fn advances_only_while_started() {
        let mut engine = ClockEngine::new();
        engine.load(&score()).unwrap();

        engine.advance(1.0);
        assert_eq!(engine.ticks().unwrap(), 0.0);

        engine.start().unwrap();
        engine.advance(0.5);
        // 120 bpm at 480 ppq is 960 ticks per second.
        assert_eq!(engine.ticks().unwrap(), 480.0);
    }

    #[test]
    fn tempo_scales_speed_not_positions() {
        let mut engine = ClockEngine::new();
        engine.load(&score()).unwrap();
        engine.start().unwrap();
        engine.set_bpm(60.0).unwrap();
        engine.advance(1.0);
        assert_eq!(engine.ticks().unwrap(), 480.0);
        assert_eq!(engine.ticks_to_seconds(480), 1.0);
        assert!(engine.set_bpm(0.0).is_err());
    }

    #[test]
    fn triggers_sampler_for_covered_notes_only() {
        let sampler = RecordingSampler::default();
        let hits = sampler.hits.clone();
        let mut engine = ClockEngine::with_sampler(Box::new(sampler));
        engine.load(&score()).unwrap();
        engine.start().unwrap();

        engine.advance(0.5);
        assert_eq!(hits.borrow().len(), 1);
        assert_eq!(hits.borrow()[0], ("C4".to_string(), 0.5));

        engine.advance(0.6);
        assert_eq!(hits.borrow().len(), 2);
    }

    #[test]
    fn seeking_never_triggers_notes() {
        let sampler = RecordingSampler::default();
        let hits = sampler.hits.clone();
        let mut engine = ClockEngine::with_sampler(Box::new(sampler));
        engine.load(&score()).unwrap();
        engine.start().unwrap();
        engine.set_ticks(1000).unwrap();
        assert!(hits.borrow().is_empty());

        engine.advance(0.1);
        assert!(hits.borrow().is_empty());
    }

    #[test]
    fn stop_rewinds_and_release_drops_the_part() {
        let sampler = RecordingSampler::default();
        let releases = sampler.releases.clone();
        let mut engine = ClockEngine::with_sampler(Box::new(sampler));
        engine.load(&score()).unwrap();
        engine.start().unwrap();
        engine.advance(1.0);

        engine.stop().unwrap();
        assert_eq!(engine.ticks().unwrap(), 0.0);
        assert!(!engine.is_started());

        engine.release();
        assert!(*releases.borrow() >= 2);
        engine.start().unwrap();
        engine.advance(10.0);
        assert!(format!("{engine:?}").contains("part: 0"));
    }
}
