//! One playback session: the explicit context that owns every subsystem for
//! the currently loaded score.
//!
//! The two per-frame loops (sync and effects) are driven from
//! [`Session::frame`]. Errors raised inside a frame are caught here, logged
//! and handed to the injected error callback; both loops stay scheduled.

use crate::{
    audio::AudioEngine,
    config::AppConfig,
    effects::{EffectsEngine, EffectsNote},
    store::SnapshotStore,
    sync::{SubscriptionId, SyncLoop, SyncSnapshot},
    theme::Theme,
    timeline::{Tick, Timeline},
    transport::{validate_playback_rate, TransportController},
    PianoError, Result, Score,
};

pub type ErrorCallback = Box<dyn FnMut(&PianoError)>;

pub struct Session<E: AudioEngine> {
    config: AppConfig,
    engine: E,
    timeline: Timeline,
    transport: TransportController,
    sync: SyncLoop,
    effects: EffectsEngine,
    store: Option<Box<dyn SnapshotStore>>,
    score_id: Option<String>,
    on_error: Option<ErrorCallback>,
}

impl<E: AudioEngine> Session<E> {
    /// Creates an idle session with an empty timeline and a `width` x
    /// `height` effects surface.
    pub fn new(config: AppConfig, engine: E, width: u32, height: u32) -> Self {
        let transport = TransportController::new(&config.transport);
        let sync = SyncLoop::new(&config.sync);
        let effects = EffectsEngine::new(&config.effects, width, height);
        Self {
            config,
            engine,
            timeline: Timeline::empty(),
            transport,
            sync,
            effects,
            store: None,
            score_id: None,
            on_error: None,
        }
    }

    pub fn with_store(mut self, store: Box<dyn SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Installs the callback that receives errors caught at the loop
    /// boundary and failed loads.
    pub fn on_error(&mut self, callback: impl FnMut(&PianoError) + 'static) {
        self.on_error = Some(Box::new(callback));
    }

    /// Starts both frame loops.
    pub fn start(&mut self) {
        self.sync.start();
        self.effects.start();
        tracing::info!("session loops started");
    }

    /// Swaps in a new score. A failed or invalid score is reported and
    /// leaves the session idle on an empty timeline with the engine stopped
    /// and released.
    pub fn load_score(&mut self, id: &str, score: Result<Score>) {
        self.persist_position();
        self.effects.reset();
        self.sync.reset();
        if let Err(err) = self.engine.stop() {
            self.report(err);
        }

        let score = match score.and_then(|score| score.validate().map(|_| score)) {
            Ok(score) => score,
            Err(err) => {
                self.unload();
                tracing::warn!(id, error = %err, "score failed to load");
                self.report(err);
                return;
            }
        };

        if let Err(err) = self.engine.load(&score) {
            self.unload();
            self.report(err);
            return;
        }

        self.timeline = Timeline::build(&score);
        self.transport.load(&self.timeline);
        self.score_id = Some(id.to_string());

        let rate = self
            .store
            .as_ref()
            .and_then(|store| store.playback_rate())
            .unwrap_or(self.config.transport.default_rate);
        let position = self
            .store
            .as_ref()
            .and_then(|store| store.position(id))
            .unwrap_or(0);

        let restored = self
            .transport
            .set_rate(rate, &mut self.engine)
            .and_then(|_| self.transport.seek(position, &mut self.engine));
        let tick = match restored {
            Ok(tick) => tick,
            Err(err) => {
                self.report(err);
                self.transport.tick()
            }
        };
        self.sync.rebuild_at(&self.timeline, tick);

        tracing::info!(
            id,
            title = %score.title,
            notes = score.notes.len(),
            end_tick = self.timeline.end_tick(),
            tick,
            "score loaded"
        );
    }

    fn unload(&mut self) {
        if let Err(err) = self.engine.stop() {
            self.report(err);
        }
        self.engine.release();
        self.effects.reset();
        self.effects.set_active_notes(Vec::new());
        self.sync.reset();
        self.timeline = Timeline::empty();
        self.transport.load(&self.timeline);
        self.score_id = None;
    }

    /// Runs one frame of both loops at `now_ms`.
    pub fn frame(&mut self, now_ms: f64) {
        if let Err(err) = self.sync.frame(&self.timeline, &mut self.transport, &mut self.engine) {
            self.report(err);
        }

        self.effects.set_playing(self.transport.state().is_playing);
        match self.published_notes() {
            Ok(Some(notes)) => self.effects.set_active_notes(notes),
            Ok(None) => {}
            Err(err) => self.report(err),
        }

        if let Err(err) = self.effects.frame(now_ms) {
            self.report(err);
        }
    }

    /// Holds the transport at `tick` and runs `frames` effects frames
    /// `step_ms` apart, so particles evolve while the position stays put.
    /// Returns the tick actually applied.
    pub fn capture(&mut self, tick: Tick, frames: u32, step_ms: f64) -> Result<Tick> {
        let tick = self.seek(tick)?;
        self.frame(0.0);
        self.effects.set_playing(true);
        let mut result = Ok(tick);
        for frame in 1..frames.max(1) {
            if let Err(err) = self.effects.frame(frame as f64 * step_ms) {
                result = Err(err);
                break;
            }
        }
        self.effects.set_playing(self.transport.state().is_playing);
        result
    }

    fn published_notes(&self) -> Result<Option<Vec<EffectsNote>>> {
        let Some(snapshot) = self.sync.snapshot() else {
            return Ok(None);
        };
        let notes = snapshot
            .active_notes
            .iter()
            .map(|note| EffectsNote::from_active(note, &self.config.colors, self.config.split))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(notes))
    }

    fn report(&mut self, err: PianoError) {
        tracing::warn!(error = %err, "frame error");
        if let Some(callback) = self.on_error.as_mut() {
            callback(&err);
        }
    }

    fn persist_position(&mut self) {
        let (Some(id), Some(store)) = (self.score_id.as_deref(), self.store.as_mut()) else {
            return;
        };
        if let Err(err) = store.set_position(id, self.transport.tick()) {
            tracing::warn!(error = %err, "failed to persist position");
        }
    }

    /// Persists the position, stops both loops and releases the engine.
    pub fn teardown(&mut self) {
        self.persist_position();
        self.sync.stop();
        self.sync.reset();
        self.effects.set_container_height(0.0);
        self.effects.destroy();
        self.unload();
        tracing::info!("session torn down");
    }

    pub fn play(&mut self) -> Result<()> {
        self.transport.play(&mut self.engine)?;
        self.sync.set_baseline(&self.timeline, self.transport.tick());
        self.effects.set_playing(true);
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        self.transport.pause(&mut self.engine)?;
        self.effects.set_playing(false);
        Ok(())
    }

    pub fn toggle_play(&mut self) -> Result<()> {
        if self.transport.state().is_playing {
            self.pause()
        } else {
            self.play()
        }
    }

    pub fn stop(&mut self) -> Result<()> {
        self.transport.stop(&mut self.engine)?;
        self.sync.rebuild_at(&self.timeline, 0);
        self.effects.set_playing(false);
        Ok(())
    }

    pub fn seek(&mut self, tick: Tick) -> Result<Tick> {
        let tick = self.transport.seek(tick, &mut self.engine)?;
        self.sync.rebuild_at(&self.timeline, tick);
        Ok(tick)
    }

    pub fn seek_seconds(&mut self, seconds: f64) -> Result<Tick> {
        let tick = self.transport.seek_seconds(seconds, &mut self.engine)?;
        self.sync.rebuild_at(&self.timeline, tick);
        Ok(tick)
    }

    /// Applies a clamped rate and persists it.
    pub fn set_rate(&mut self, rate: f64) -> Result<f64> {
        let rate = self.transport.set_rate(validate_playback_rate(rate), &mut self.engine)?;
        if let Some(store) = self.store.as_mut() {
            store.set_playback_rate(rate)?;
        }
        Ok(rate)
    }

    pub fn set_loop(&mut self, start: Tick, end: Tick) {
        self.transport.set_loop(start, end);
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.transport.toggle_loop()
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.effects.set_theme(theme);
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&SyncSnapshot) + 'static) -> SubscriptionId {
        self.sync.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.sync.unsubscribe(id)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn score_id(&self) -> Option<&str> {
        self.score_id.as_deref()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn transport(&self) -> &TransportController {
        &self.transport
    }

    pub fn sync(&self) -> &SyncLoop {
        &self.sync
    }

    pub fn effects(&self) -> &EffectsEngine {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut EffectsEngine {
        &mut self.effects
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn store(&self) -> Option<&dyn SnapshotStore> {
        self.store.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{audio::ClockEngine, store::MemoryStore, ScoreNote};

    fn scenario_score() -> Score {
        Score::new(
            480,
            120.0,
            vec![ScoreNote::new("C4", 0, 480), ScoreNote::new("E4", 240, 480)],
        )
    }

    fn session() -> Session<ClockEngine> {
        let mut config = AppConfig::default();
        config.effects.seed = Some(3);
        let mut session = Session::new(config, ClockEngine::new(), 1296, 400);
        session.effects_mut().set_impact_y(380.0);
        session.start();
        session
    }

    fn errors(session: &mut Session<ClockEngine>) -> Rc<RefCell<Vec<String>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        session.on_error(move |err| sink.borrow_mut().push(err.to_string()));
        seen
    }

    fn pitches<E: AudioEngine>(session: &Session<E>) -> Vec<String> {
        session.sync().active().iter().map(|n| n.pitch.clone()).collect()
    }

    #[test]
    fn failed_load_reports_and_stays_idle() {
        let mut session = session();
        let seen = errors(&mut session);
        session.load_score("broken", Err(PianoError::InvalidScore("no notes".into())));

        assert_eq!(seen.borrow().len(), 1);
        assert!(session.timeline().is_empty());
        assert_eq!(session.score_id(), None);

        // Idle frames are harmless.
        session.frame(0.0);
        session.frame(16.0);
        assert!(session.sync().active().is_empty());
        assert_eq!(seen.borrow().len(), 1);
    }

    #[derive(Default, Clone)]
    struct CountingSampler {
        hits: Rc<RefCell<usize>>,
    }

    impl crate::audio::Sampler for CountingSampler {
        fn trigger(&mut self, _pitch: &str, _duration_secs: f64, _velocity: u8) {
            *self.hits.borrow_mut() += 1;
        }

        fn release_all(&mut self) {}
    }

    #[test]
    fn failed_load_silences_the_previous_score() {
        let sampler = CountingSampler::default();
        let hits = sampler.hits.clone();
        let mut config = AppConfig::default();
        config.effects.seed = Some(5);
        let mut session = Session::new(config, ClockEngine::with_sampler(Box::new(sampler)), 640, 200);
        session.start();
        let seen = errors(&mut session);

        let notes = (0..20)
            .map(|i| ScoreNote::new("C4", i * 240, 200))
            .collect();
        session.load_score("a", Ok(Score::new(480, 120.0, notes)));
        session.play().unwrap();
        session.engine_mut().advance(1.0);
        session.frame(0.0);
        assert!(*hits.borrow() > 0);
        assert!(!session.sync().active().is_empty());

        session.load_score("b", Err(PianoError::InvalidScore("truncated".into())));
        assert_eq!(seen.borrow().len(), 1);
        assert!(!session.engine().is_started());
        assert_eq!(session.engine().ticks().unwrap(), 0.0);

        let before = *hits.borrow();
        session.engine_mut().advance(2.0);
        session.frame(16.0);
        assert_eq!(*hits.borrow(), before);
        assert_eq!(session.transport().tick(), 0);
        assert_eq!(session.transport().end_tick(), 0);
        assert!(!session.transport().state().is_playing);
        assert!(session.sync().active().is_empty());
        assert!(session.effects().active_notes().is_empty());
    }

    #[test]
    fn invalid_pitch_is_rejected_at_load() {
        let mut session = session();
        let seen = errors(&mut session);
        let score = Score::new(480, 120.0, vec![ScoreNote::new("H4", 0, 480)]);
        session.load_score("bad", Ok(score));
        assert_eq!(seen.borrow().len(), 1);
        assert!(session.timeline().is_empty());
    }

    #[test]
    fn playback_drives_sync_and_effects() {
        let mut session = session();
        session.load_score("song", Ok(scenario_score()));
        session.play().unwrap();

        session.frame(0.0);
        assert_eq!(pitches(&session), vec!["C4"]);
        assert_eq!(session.effects().active_notes().len(), 1);

        // 0.3125 s at 120 BPM and 480 PPQ is 300 ticks.
        session.engine_mut().advance(0.3125);
        session.frame(16.0);
        assert_eq!(pitches(&session), vec!["C4", "E4"]);
        assert_eq!(session.effects().active_notes().len(), 2);
        assert!(session.effects().particles().active_count() > 0);
    }

    fn particle_positions(session: &Session<ClockEngine>) -> Vec<(f32, f32)> {
        session
            .effects()
            .particles()
            .particles()
            .iter()
            .filter(|p| p.active)
            .map(|p| (p.x, p.y))
            .collect()
    }

    #[test]
    fn capture_spreads_particles_without_moving_the_tick() {
        let mut single = session();
        single.load_score("song", Ok(scenario_score()));
        single.capture(300, 1, 16.0).unwrap();
        let first = particle_positions(&single);
        assert!(!first.is_empty());

        let mut held = session();
        held.load_score("song", Ok(scenario_score()));
        let tick = held.capture(300, 30, 16.0).unwrap();
        assert_eq!(tick, 300);
        assert_eq!(held.transport().tick(), 300);
        assert!(!held.transport().state().is_playing);
        assert_eq!(pitches(&held), vec!["C4", "E4"]);
        assert_ne!(particle_positions(&held), first);
    }

    #[test]
    fn restores_rate_and_position() {
        let mut store = MemoryStore::new();
        store.set_playback_rate(0.5).unwrap();
        store.set_position("song", 300).unwrap();

        let mut session = session().with_store(Box::new(store));
        session.load_score("song", Ok(scenario_score()));

        assert_eq!(session.transport().tick(), 300);
        assert_eq!(session.transport().state().rate, 0.5);
        assert_eq!(session.engine().bpm(), 60.0);
        assert_eq!(pitches(&session), vec!["C4", "E4"]);
    }

    #[test]
    fn teardown_persists_and_releases() {
        let mut session = session().with_store(Box::new(MemoryStore::new()));
        session.load_score("song", Ok(scenario_score()));
        session.seek(500).unwrap();
        session.play().unwrap();
        session.frame(0.0);

        session.teardown();
        assert_eq!(session.store().unwrap().position("song"), Some(500));
        assert!(!session.sync().is_running());
        assert!(!session.effects().is_running());
        assert_eq!(session.effects().particles().active_count(), 0);
        assert!(!session.engine().is_started());
        assert_eq!(session.engine().ticks().unwrap(), 0.0);
        assert!(session.timeline().is_empty());
    }

    #[test]
    fn switching_scores_saves_previous_position() {
        let mut session = session().with_store(Box::new(MemoryStore::new()));
        session.load_score("first", Ok(scenario_score()));
        session.seek(700).unwrap();
        session.load_score("second", Ok(scenario_score()));

        let store = session.store().unwrap();
        assert_eq!(store.position("first"), Some(700));
        assert_eq!(session.transport().tick(), 0);
    }

    #[test]
    fn rate_changes_are_persisted() {
        let mut session = session().with_store(Box::new(MemoryStore::new()));
        session.load_score("song", Ok(scenario_score()));
        assert_eq!(session.set_rate(3.0).unwrap(), 2.0);
        assert_eq!(session.store().unwrap().playback_rate(), Some(2.0));
        assert_eq!(session.engine().bpm(), 240.0);
    }

    #[test]
    fn loop_wrap_through_session() {
        let mut score = scenario_score();
        score.notes.push(ScoreNote::new("G4", 1200, 240));
        let mut session = session();
        session.load_score("song", Ok(score));
        session.set_loop(0, 960);
        assert!(session.toggle_loop());
        session.play().unwrap();
        session.frame(0.0);

        // One second at 120 BPM reaches tick 960.
        session.engine_mut().advance(1.0);
        session.frame(16.0);
        assert_eq!(session.transport().tick(), 0);
        assert_eq!(*session.sync().active(), session.timeline().active_at(0));
    }

    #[test]
    fn seek_back_rebuilds() {
        let mut session = session();
        session.load_score("song", Ok(scenario_score()));
        session.play().unwrap();
        session.engine_mut().advance(1.2);
        session.frame(0.0);
        assert!(session.sync().active().is_empty());

        let tick: Tick = session.seek(300).unwrap();
        session.frame(16.0);
        assert_eq!(tick, 300);
        assert_eq!(pitches(&session), vec!["C4", "E4"]);
    }

    struct FlakyEngine {
        inner: ClockEngine,
        fail: bool,
    }

    impl AudioEngine for FlakyEngine {
        fn load(&mut self, score: &Score) -> Result<()> {
            self.inner.load(score)
        }

        fn ticks(&self) -> Result<f64> {
            if self.fail {
                return Err(PianoError::Audio("transport unavailable".into()));
            }
            self.inner.ticks()
        }

        fn is_started(&self) -> bool {
            self.inner.is_started()
        }

        fn start(&mut self) -> Result<()> {
            self.inner.start()
        }

        fn pause(&mut self) -> Result<()> {
            self.inner.pause()
        }

        fn stop(&mut self) -> Result<()> {
            self.inner.stop()
        }

        fn set_ticks(&mut self, ticks: Tick) -> Result<()> {
            self.inner.set_ticks(ticks)
        }

        fn bpm(&self) -> f64 {
            self.inner.bpm()
        }

        fn set_bpm(&mut self, bpm: f64) -> Result<()> {
            self.inner.set_bpm(bpm)
        }

        fn ticks_to_seconds(&self, ticks: Tick) -> f64 {
            self.inner.ticks_to_seconds(ticks)
        }

        fn release(&mut self) {
            self.inner.release()
        }
    }

    #[test]
    fn frame_errors_are_reported_and_loops_survive() {
        let engine = FlakyEngine {
            inner: ClockEngine::new(),
            fail: true,
        };
        let mut session = Session::new(AppConfig::default(), engine, 320, 200);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        session.on_error(move |err| sink.borrow_mut().push(err.to_string()));
        session.start();
        session.load_score("song", Ok(scenario_score()));
        session.play().unwrap();

        session.frame(0.0);
        session.frame(16.0);
        assert_eq!(seen.borrow().len(), 2);
        assert!(seen.borrow()[0].contains("transport unavailable"));
        assert!(session.sync().is_running());

        session.engine_mut().fail = false;
        session.frame(32.0);
        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(pitches(&session), vec!["C4"]);
    }
}
