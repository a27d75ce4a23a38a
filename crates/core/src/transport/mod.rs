//! Playback position, rate and loop region.
//!
//! The controller drives the audio engine but never touches the active-note
//! set itself: every jump it performs (seek, loop wrap) returns the new tick
//! so the caller can run the canonical rebuild on the sync loop.

use serde::{Deserialize, Serialize};

use crate::{
    audio::AudioEngine,
    config::TransportConfig,
    timeline::{seconds_to_ticks, Tick, Timeline},
    Result,
};

pub const MIN_PLAYBACK_RATE: f64 = 0.1;
pub const MAX_PLAYBACK_RATE: f64 = 2.0;
pub const DEFAULT_PLAYBACK_RATE: f64 = 1.0;

/// Clamps a playback rate into `[0.1, 2.0]`. NaN falls back to 1.0.
pub fn validate_playback_rate(rate: f64) -> f64 {
    if rate.is_nan() {
        return DEFAULT_PLAYBACK_RATE;
    }
    rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportState {
    pub tick: Tick,
    pub rate: f64,
    pub is_playing: bool,
    pub is_looping: bool,
    pub loop_start_tick: Tick,
    pub loop_end_tick: Tick,
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            tick: 0,
            rate: DEFAULT_PLAYBACK_RATE,
            is_playing: false,
            is_looping: false,
            loop_start_tick: 0,
            loop_end_tick: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransportController {
    state: TransportState,
    end_tick: Tick,
    base_bpm: f64,
    ppq: u32,
    loop_epsilon_beats: f64,
    loop_epsilon: Tick,
}

impl TransportController {
    pub fn new(config: &TransportConfig) -> Self {
        let mut controller = Self {
            state: TransportState {
                rate: validate_playback_rate(config.default_rate),
                ..TransportState::default()
            },
            end_tick: 0,
            base_bpm: crate::score::DEFAULT_BPM,
            ppq: crate::score::DEFAULT_PPQ,
            loop_epsilon_beats: config.loop_epsilon_beats,
            loop_epsilon: 0,
        };
        controller.update_epsilon();
        controller
    }

    /// Binds the controller to a freshly built timeline. Position and loop
    /// are reset; the playback rate is kept.
    pub fn load(&mut self, timeline: &Timeline) {
        self.end_tick = timeline.end_tick();
        self.base_bpm = timeline.bpm();
        self.ppq = timeline.ppq();
        self.update_epsilon();
        self.state = TransportState {
            rate: self.state.rate,
            ..TransportState::default()
        };
    }

    fn update_epsilon(&mut self) {
        self.loop_epsilon = (self.ppq as f64 * self.loop_epsilon_beats).round().max(0.0) as Tick;
    }

    pub fn state(&self) -> &TransportState {
        &self.state
    }

    pub fn tick(&self) -> Tick {
        self.state.tick
    }

    pub fn end_tick(&self) -> Tick {
        self.end_tick
    }

    pub fn base_bpm(&self) -> f64 {
        self.base_bpm
    }

    pub fn loop_epsilon(&self) -> Tick {
        self.loop_epsilon
    }

    pub fn play(&mut self, engine: &mut dyn AudioEngine) -> Result<()> {
        engine.start()?;
        self.state.is_playing = true;
        Ok(())
    }

    pub fn pause(&mut self, engine: &mut dyn AudioEngine) -> Result<()> {
        engine.pause()?;
        self.state.is_playing = false;
        Ok(())
    }

    pub fn toggle_play(&mut self, engine: &mut dyn AudioEngine) -> Result<()> {
        if self.state.is_playing {
            self.pause(engine)
        } else {
            self.play(engine)
        }
    }

    /// Pauses, rewinds to tick 0 and forgets the loop region.
    pub fn stop(&mut self, engine: &mut dyn AudioEngine) -> Result<()> {
        engine.stop()?;
        self.state = TransportState {
            rate: self.state.rate,
            ..TransportState::default()
        };
        Ok(())
    }

    /// Moves to `target` clamped to the score end and returns the tick
    /// actually applied.
    pub fn seek(&mut self, target: Tick, engine: &mut dyn AudioEngine) -> Result<Tick> {
        let tick = target.min(self.end_tick);
        engine.set_ticks(tick)?;
        self.state.tick = tick;
        tracing::debug!(target, tick, "seek");
        Ok(tick)
    }

    /// Seeks to a position given in seconds at the base tempo. Negative and
    /// NaN positions clamp to 0.
    pub fn seek_seconds(&mut self, seconds: f64, engine: &mut dyn AudioEngine) -> Result<Tick> {
        let target = seconds_to_ticks(seconds, self.ppq, self.base_bpm);
        self.seek(target, engine)
    }

    /// Scales the engine tempo; tick positions are untouched.
    pub fn set_rate(&mut self, rate: f64, engine: &mut dyn AudioEngine) -> Result<f64> {
        let rate = validate_playback_rate(rate);
        engine.set_bpm(self.base_bpm * rate)?;
        self.state.rate = rate;
        Ok(rate)
    }

    /// Stores a loop region clamped into `[0, end]`. A reversed region is
    /// swapped. Looping itself is not switched on.
    pub fn set_loop(&mut self, start: Tick, end: Tick) {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        self.state.loop_start_tick = start.min(self.end_tick);
        self.state.loop_end_tick = end.min(self.end_tick);
    }

    /// Flips looping. Enabling it with no region set loops the whole score.
    pub fn toggle_loop(&mut self) -> bool {
        self.state.is_looping = !self.state.is_looping;
        if self.state.is_looping
            && self.state.loop_start_tick == 0
            && self.state.loop_end_tick == 0
        {
            self.state.loop_end_tick = self.end_tick;
        }
        self.state.is_looping
    }

    /// Looping only counts when the region is longer than the epsilon.
    pub fn loop_active(&self) -> bool {
        self.state.is_looping
            && self.state.loop_end_tick > self.state.loop_start_tick + self.loop_epsilon
    }

    /// Where playback must jump to if `tick` has reached the loop end.
    pub fn loop_wrap_target(&self, tick: Tick) -> Option<Tick> {
        (self.loop_active() && tick >= self.state.loop_end_tick).then_some(self.state.loop_start_tick)
    }

    /// Performs a loop wrap on the engine and returns the tick jumped to.
    pub fn wrap_to(&mut self, target: Tick, engine: &mut dyn AudioEngine) -> Result<Tick> {
        engine.set_ticks(target)?;
        self.state.tick = target;
        tracing::debug!(target, "loop wrap");
        Ok(target)
    }

    /// Records the position and running state observed on the engine.
    pub fn observe(&mut self, tick: Tick, is_playing: bool) {
        self.state.tick = tick;
        self.state.is_playing = is_playing;
    }
}

impl Default for TransportController {
    fn default() -> Self {
        Self::new(&TransportConfig::default())
    }
}
