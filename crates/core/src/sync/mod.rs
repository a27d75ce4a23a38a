//! Per-frame reconciliation of the audio clock with the timeline.
//!
//! Forward motion is applied incrementally, visiting only ticks that carry
//! events. Any backward jump (external seek, loop wrap) goes through the
//! canonical rebuild instead. A snapshot is published to observers only when
//! it differs from the previous one.

use serde::{Deserialize, Serialize};

use crate::{
    audio::AudioEngine,
    config::SyncConfig,
    timeline::{seconds_to_ticks, ticks_to_seconds, ActiveNote, ActiveNoteSet, PreviewNote, Tick, Timeline},
    transport::TransportController,
    Result,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSnapshot {
    pub tick: Tick,
    /// Elapsed score time at the base tempo, independent of playback rate.
    pub time_secs: f64,
    pub is_playing: bool,
    pub active_notes: Vec<ActiveNote>,
    pub preview_notes: Vec<PreviewNote>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut(&SyncSnapshot)>;

pub struct SyncLoop {
    config: SyncConfig,
    running: bool,
    active: ActiveNoteSet,
    /// Tick processed by the previous frame; `None` until tick 0 has been
    /// visited once.
    last: Option<Tick>,
    /// Set by rebuilds so the next frame refreshes the preview and publishes.
    dirty: bool,
    preview: Vec<PreviewNote>,
    preview_tick: Option<Tick>,
    published: Option<SyncSnapshot>,
    observers: Vec<(SubscriptionId, Observer)>,
    next_id: u64,
}

impl SyncLoop {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            config: config.clone(),
            running: false,
            active: ActiveNoteSet::new(),
            last: None,
            dirty: false,
            preview: Vec::new(),
            preview_tick: None,
            published: None,
            observers: Vec::new(),
            next_id: 0,
        }
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Forgets all per-score state. Observers stay subscribed.
    pub fn reset(&mut self) {
        self.active.clear();
        self.last = None;
        self.dirty = false;
        self.preview.clear();
        self.preview_tick = None;
        self.published = None;
    }

    pub fn active(&self) -> &ActiveNoteSet {
        &self.active
    }

    pub fn last_tick(&self) -> Option<Tick> {
        self.last
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Option<&SyncSnapshot> {
        self.published.as_ref()
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&SyncSnapshot) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    /// Replaces the active set with the canonical reconstruction at `tick`.
    /// Seeks and loop wraps both land here.
    pub fn rebuild_at(&mut self, timeline: &Timeline, tick: Tick) {
        self.active = timeline.active_at(tick);
        self.last = Some(tick);
        self.dirty = true;
    }

    /// Captures the playback start position so the first frame does not see
    /// a large spurious delta.
    pub fn set_baseline(&mut self, timeline: &Timeline, tick: Tick) {
        if self.last != Some(tick) {
            self.rebuild_at(timeline, tick);
        }
    }

    /// One animation frame of reconciliation.
    pub fn frame(
        &mut self,
        timeline: &Timeline,
        transport: &mut TransportController,
        engine: &mut dyn AudioEngine,
    ) -> Result<()> {
        if !self.running {
            return Ok(());
        }

        if !engine.is_started() {
            // Paused: only reflect the stopped transport and pending seeks.
            let tick = transport.tick();
            transport.observe(tick, false);
            let changed = std::mem::take(&mut self.dirty);
            self.settle(timeline, tick, false, changed);
            return Ok(());
        }

        let current = whole_ticks(engine.ticks()?);
        let mut changed = std::mem::take(&mut self.dirty);

        match self.last {
            Some(last) if current < last => {
                self.active = timeline.active_at(current);
                changed = true;
            }
            last => {
                for &tick in timeline.ticks_in(last, current) {
                    for event in timeline.events_at(tick) {
                        changed |= self.active.apply(event);
                    }
                }
            }
        }
        self.last = Some(current);
        transport.observe(current, true);

        if let Some(target) = transport.loop_wrap_target(current) {
            let tick = transport.wrap_to(target, engine)?;
            self.rebuild_at(timeline, tick);
            return Ok(());
        }

        self.settle(timeline, current, true, changed);
        Ok(())
    }

    /// Steps 5 to 7: time, throttled preview, publish on difference.
    fn settle(&mut self, timeline: &Timeline, tick: Tick, is_playing: bool, notes_changed: bool) {
        let time_secs = ticks_to_seconds(tick, timeline.ppq(), timeline.bpm());

        let preview_due = match self.preview_tick {
            None => true,
            Some(at) => notes_changed || tick.abs_diff(at) > self.config.preview_tick_threshold,
        };
        if preview_due {
            let window = seconds_to_ticks(self.config.preview_lookahead_secs, timeline.ppq(), timeline.bpm());
            self.preview = timeline.preview_window(tick, window);
            self.preview_tick = Some(tick);
        }

        let snapshot = SyncSnapshot {
            tick,
            time_secs,
            is_playing,
            active_notes: self.active.to_vec(),
            preview_notes: self.preview.clone(),
        };
        if self.published.as_ref() == Some(&snapshot) {
            return;
        }
        for (_, observer) in &mut self.observers {
            observer(&snapshot);
        }
        self.published = Some(snapshot);
    }
}

impl std::fmt::Debug for SyncLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncLoop")
            .field("running", &self.running)
            .field("last", &self.last)
            .field("active", &self.active.len())
            .field("preview", &self.preview.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

fn whole_ticks(ticks: f64) -> Tick {
    if ticks.is_finite() && ticks > 0.0 {
        ticks.floor() as Tick
    } else {
        0
    }
}
