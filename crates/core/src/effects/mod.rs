//! Frame-driven effects renderer.
//!
//! A single stateful object that owns the drawing surface, the bloom buffer
//! and the particle pool. It consumes the latest active notes (last write
//! wins) and detects note-ons itself by diffing key sets between frames.

use std::collections::{BTreeSet, HashMap};
use std::f32::consts::PI;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    colors::note_color,
    config::{EffectsConfig, HitstopConfig},
    keyboard::{key_position, KeyGeometry, KeyboardLayout},
    particles::{EmitOptions, ParticleKind, ParticleSystem, DEFAULT_GRAVITY},
    render::{Blend, Canvas, Paint, Rgb, Rgba},
    score::midi_from_name,
    theme::{BloomProfile, Theme, VisualProfile},
    timeline::ActiveNote,
    ColorSettings, PianoError, Result, SplitStrategy,
};

pub const IMPACT_FLASH_MS: f64 = 150.0;
pub const PHOSPHOR_MS: f64 = 500.0;
/// Beam boost window after a note-on.
pub const FRESH_NOTE_MS: f64 = 300.0;
pub const ACTIVATION_MAX_AGE_MS: f64 = 1000.0;
/// Live bursts needed to keep bloom on with no active notes.
pub const BLOOM_BURST_THRESHOLD: usize = 5;

const MAX_DT: f32 = 0.05;
const FIRST_DT: f32 = 0.016;

const GOD_RAY_WIDTH: f32 = 120.0;
const GOD_RAY_OPACITY_BASE: f32 = 0.04;
const GOD_RAY_OPACITY_VARY: f32 = 0.02;
const GLOW_RADIUS: f32 = 24.0;
const PHOSPHOR_RADIUS: f32 = 20.0;
const PHOSPHOR_COLOR: Rgb = Rgb::new(34, 197, 94);
const TRAIL_HEIGHT: f32 = 5.0;
const RAIL_HEIGHT: f32 = 2.0;
const FLASH_HEIGHT: f32 = 6.0;

/// An active note resolved to a key and a colour.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectsNote {
    pub pitch: String,
    pub midi: u8,
    pub color: Rgb,
    pub velocity: u8,
}

impl EffectsNote {
    pub fn from_active(note: &ActiveNote, colors: &ColorSettings, split: SplitStrategy) -> Result<Self> {
        let midi = midi_from_name(&note.pitch)?;
        Ok(Self {
            pitch: note.pitch.clone(),
            midi,
            color: note_color(note.track, midi, colors, split),
            velocity: note.velocity,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct ImpactFlash {
    started_ms: f64,
    left: f32,
    width: f32,
    color: Rgb,
}

#[derive(Debug, Clone, Copy)]
struct PhosphorTrace {
    midi: u8,
    started_ms: f64,
}

pub struct EffectsEngine {
    canvas: Canvas,
    bloom: Canvas,
    bloom_scale: f32,
    particles: ParticleSystem,
    rng: StdRng,
    layout: KeyboardLayout,

    theme: Theme,
    profile: VisualProfile,
    container_height: f32,
    impact_y: f32,
    is_playing: bool,
    running: bool,

    active: Vec<EffectsNote>,
    prev_keys: BTreeSet<u8>,
    flashes: Vec<ImpactFlash>,
    traces: Vec<PhosphorTrace>,
    activations: HashMap<u8, f64>,

    debris_cooldown_ms: f64,
    last_debris_ms: Option<f64>,
    last_frame_ms: Option<f64>,

    hitstop: HitstopConfig,
    hitstop_until_ms: f64,
    last_hitstop_ms: Option<f64>,
}

impl EffectsEngine {
    pub fn new(config: &EffectsConfig, width: u32, height: u32) -> Self {
        let rng = match config.seed {
            // Offset so ambient emission does not mirror the particle stream.
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
            None => StdRng::from_os_rng(),
        };
        let bloom_scale = config.bloom_scale.clamp(0.01, 1.0);
        let mut engine = Self {
            canvas: Canvas::new(width, height),
            bloom: Canvas::new(1, 1),
            bloom_scale,
            particles: ParticleSystem::with_options(config.pool_capacity, DEFAULT_GRAVITY, config.seed),
            rng,
            layout: KeyboardLayout::new(),
            theme: config.theme,
            profile: config.theme.profile(),
            container_height: height as f32,
            impact_y: height as f32,
            is_playing: false,
            running: false,
            active: Vec::new(),
            prev_keys: BTreeSet::new(),
            flashes: Vec::new(),
            traces: Vec::new(),
            activations: HashMap::new(),
            debris_cooldown_ms: config.debris_cooldown_ms,
            last_debris_ms: None,
            last_frame_ms: None,
            hitstop: config.hitstop.clone(),
            hitstop_until_ms: f64::NEG_INFINITY,
            last_hitstop_ms: None,
        };
        engine.resize(width, height);
        engine
    }

    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        self.last_frame_ms = None;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Drops every transient: particles, flashes, traces, activations and
    /// the previous key set.
    pub fn reset(&mut self) {
        self.particles.clear();
        self.prev_keys.clear();
        self.flashes.clear();
        self.traces.clear();
        self.activations.clear();
        self.last_debris_ms = None;
        self.last_frame_ms = None;
        self.hitstop_until_ms = f64::NEG_INFINITY;
        self.last_hitstop_ms = None;
    }

    pub fn destroy(&mut self) {
        self.stop();
        self.reset();
        self.active.clear();
        self.canvas.clear();
        tracing::debug!("effects engine destroyed");
    }

    /// Resizes the drawing surface and the bloom buffer with it.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.canvas.resize(width, height);
        let scale = self.bloom_scale;
        let scaled = |side: u32| ((side as f32 * scale).round() as u32).max(1);
        self.bloom.resize(scaled(width), scaled(height));
    }

    /// A height of 0 means the container is not laid out: all transient
    /// state is dropped so nothing renders at stale coordinates.
    pub fn set_container_height(&mut self, height: f32) {
        if height.is_nan() || height <= 0.0 {
            self.container_height = 0.0;
            self.reset();
            return;
        }
        self.container_height = height;
    }

    pub fn set_impact_y(&mut self, y: f32) {
        self.impact_y = y;
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        self.profile = theme.profile();
        if !self.profile.phosphor {
            self.traces.clear();
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn set_playing(&mut self, is_playing: bool) {
        self.is_playing = is_playing;
    }

    pub fn set_active_notes(&mut self, notes: Vec<EffectsNote>) {
        self.active = notes;
    }

    pub fn active_notes(&self) -> &[EffectsNote] {
        &self.active
    }

    /// Starts a freeze unless one started within the cooldown.
    pub fn trigger_hitstop(&mut self, now_ms: f64) -> bool {
        if let Some(last) = self.last_hitstop_ms {
            if now_ms - last < self.hitstop.cooldown_ms {
                return false;
            }
        }
        self.hitstop_until_ms = now_ms + self.hitstop.duration_ms;
        self.last_hitstop_ms = Some(now_ms);
        true
    }

    pub fn is_frozen(&self, now_ms: f64) -> bool {
        now_ms < self.hitstop_until_ms
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    pub fn flash_count(&self) -> usize {
        self.flashes.len()
    }

    pub fn trace_count(&self) -> usize {
        self.traces.len()
    }

    pub fn activation_count(&self) -> usize {
        self.activations.len()
    }

    /// Bloom runs while notes sound or enough bursts are still in flight.
    pub fn wants_bloom(&self) -> bool {
        self.profile.bloom != BloomProfile::Disabled
            && (!self.active.is_empty()
                || self.particles.active_count_of(ParticleKind::Burst) > BLOOM_BURST_THRESHOLD)
    }

    /// Renders one frame at `now_ms`.
    pub fn frame(&mut self, now_ms: f64) -> Result<()> {
        if !now_ms.is_finite() {
            return Err(PianoError::msg(format!("frame timestamp is not finite: {now_ms}")));
        }
        if !self.running || self.container_height <= 0.0 {
            return Ok(());
        }

        let dt = step_dt(self.last_frame_ms, now_ms);
        self.last_frame_ms = Some(now_ms);

        self.detect_note_ons(now_ms);

        self.canvas.clear();
        self.draw_god_rays(now_ms);

        if self.is_playing && !self.is_frozen(now_ms) {
            self.emit_ambient();
            self.particles.update(dt);
        }
        self.particles.draw(&mut self.canvas);
        self.draw_key_glow(now_ms);
        self.draw_trails();
        self.draw_light_beams(now_ms);
        self.draw_impact_rail();
        self.draw_flashes(now_ms);
        if self.profile.phosphor {
            self.draw_phosphor(now_ms);
        }

        if self.wants_bloom() {
            self.apply_bloom();
        }
        if self.profile.scanlines {
            self.draw_scanlines();
        }
        Ok(())
    }

    fn geometry(&self, midi: u8) -> KeyGeometry {
        self.layout.key(midi).copied().unwrap_or_else(|| key_position(midi))
    }

    fn detect_note_ons(&mut self, now: f64) {
        let current: BTreeSet<u8> = self.active.iter().map(|n| n.midi).collect();

        let fresh: Vec<EffectsNote> = self
            .active
            .iter()
            .filter(|n| !self.prev_keys.contains(&n.midi))
            .cloned()
            .collect();
        for note in &fresh {
            self.note_on(note, now);
        }

        if self.is_playing
            && self
                .last_debris_ms
                .map_or(true, |last| now - last >= self.debris_cooldown_ms)
        {
            self.emit_debris();
            self.last_debris_ms = Some(now);
        }

        self.flashes.retain(|f| now - f.started_ms < IMPACT_FLASH_MS);

        if self.profile.phosphor {
            for &released in self.prev_keys.difference(&current) {
                self.traces.push(PhosphorTrace {
                    midi: released,
                    started_ms: now,
                });
            }
            self.traces.retain(|t| now - t.started_ms < PHOSPHOR_MS);
        }

        self.activations
            .retain(|_, started| now - *started <= ACTIVATION_MAX_AGE_MS);
        self.prev_keys = current;
    }

    fn note_on(&mut self, note: &EffectsNote, now: f64) {
        let key = self.geometry(note.midi);
        let (x, y) = (key.center(), self.impact_y);

        // Upward burst on the play plane, then foreground sparks.
        self.particles.emit(
            EmitOptions::at(x, y, note.color)
                .with_count(14)
                .with_speed(100.0)
                .with_size(3.0)
                .with_lifetime(0.7),
        );
        self.particles.emit(
            EmitOptions::at(x, y, note.color)
                .with_count(4)
                .with_speed(150.0)
                .with_size(4.0)
                .with_lifetime(0.8)
                .with_z(1.5),
        );
        for (size, lifetime) in [(6.0, 0.35), (8.0, 0.5)] {
            self.particles.emit(
                EmitOptions::at(x, y, note.color)
                    .with_count(1)
                    .with_speed(0.0)
                    .with_size(size)
                    .with_lifetime(lifetime)
                    .with_kind(ParticleKind::Shockwave),
            );
        }

        self.flashes.push(ImpactFlash {
            started_ms: now,
            left: key.left,
            width: key.width,
            color: note.color,
        });
        self.activations.insert(note.midi, now);

        let threshold = self.hitstop.velocity_threshold * 127.0;
        if self.hitstop.enabled && note.velocity as f32 >= threshold {
            self.trigger_hitstop(now);
        }
    }

    /// Sustained notes shed debris with a one-in-five chance per cooldown.
    fn emit_debris(&mut self) {
        let kind = self.profile.debris;
        for i in 0..self.active.len() {
            if self.rng.random::<f32>() <= 0.8 {
                continue;
            }
            let (midi, color) = (self.active[i].midi, self.active[i].color);
            let key = self.geometry(midi);
            let x = key.center() + (self.rng.random::<f32>() - 0.5) * key.width;
            let opts = EmitOptions::at(x, self.impact_y - 10.0, color)
                .with_count(1)
                .with_speed(35.0)
                .with_spread(PI / 4.0)
                .with_size(2.0)
                .with_lifetime(0.5)
                .with_kind(kind);
            self.particles.emit(opts);
        }
    }

    fn emit_ambient(&mut self) {
        if self.rng.random::<f32>() <= 0.9 {
            return;
        }
        let x = self.rng.random::<f32>() * self.layout.total_width();
        let y = self.rng.random::<f32>() * self.container_height;
        let z = self.rng.random::<f32>() * 2.0;
        let lifetime = 2.0 + self.rng.random::<f32>() * 3.0;
        self.particles.emit(
            EmitOptions::at(x, y, self.profile.atmosphere)
                .with_count(1)
                .with_speed(10.0)
                .with_size(if z > 1.2 { 3.0 } else { 1.0 })
                .with_lifetime(lifetime)
                .with_kind(self.profile.ambient)
                .with_z(z),
        );
    }

    /// Three diagonal light shafts with a slow shimmer.
    fn draw_god_rays(&mut self, now: f64) {
        let t = now as f32;
        let width = self.layout.total_width();
        let height = self.container_height;
        let shimmer = 0.5 + 0.5 * (t * 0.001).sin();
        let color = self.profile.atmosphere;
        let rays = [(0.2, PI * 0.2), (0.5, PI * 0.15), (0.8, PI * 0.25)];

        for (i, (at, angle)) in rays.into_iter().enumerate() {
            let x = width * at;
            let drift = angle.tan() * height;
            let opacity = (GOD_RAY_OPACITY_BASE + GOD_RAY_OPACITY_VARY * (t * 0.0007 + i as f32).sin()) * shimmer;
            let paint = Paint::Linear {
                from: (x, 0.0),
                to: (x + drift, height),
                stops: vec![
                    (0.0, color.with_alpha(0.0)),
                    (0.5, color.with_alpha(opacity)),
                    (1.0, color.with_alpha(0.0)),
                ],
            };
            let half = GOD_RAY_WIDTH / 2.0;
            let shaft = [
                (x - half, 0.0),
                (x + half, 0.0),
                (x + half + drift, height),
                (x - half + drift, height),
            ];
            self.canvas.fill_polygon(&shaft, &paint, Blend::Lighter, 1.0);
        }
    }

    /// Pulsing radial glow with slow hue cycling.
    fn draw_key_glow(&mut self, now: f64) {
        let t = now as f32;
        let pulse = 0.85 + 0.15 * (t * 0.002 * PI * 4.0).sin();
        let hue_shift = t * 0.0001;
        let y = self.impact_y;

        for i in 0..self.active.len() {
            let key = self.geometry(self.active[i].midi);
            let color = self.active[i].color.shift_hue(hue_shift);
            let cx = key.center();
            let paint = Paint::Radial {
                center: (cx, y),
                radius: GLOW_RADIUS,
                stops: vec![
                    (0.0, color.with_alpha(0.35 * pulse)),
                    (0.5, color.with_alpha(0.12 * pulse)),
                    (1.0, color.with_alpha(0.0)),
                ],
            };
            self.canvas.fill_rect(
                (cx - GLOW_RADIUS).round(),
                (y - GLOW_RADIUS).round(),
                GLOW_RADIUS * 2.0,
                GLOW_RADIUS * 2.0,
                &paint,
                Blend::Lighter,
                1.0,
            );
        }
    }

    fn draw_trails(&mut self) {
        let y = self.impact_y;
        for i in 0..self.active.len() {
            let key = self.geometry(self.active[i].midi);
            let color = self.active[i].color;
            let paint = Paint::vertical(
                y - TRAIL_HEIGHT,
                y,
                vec![(0.0, color.with_alpha(0.0)), (1.0, color.with_alpha(0.4))],
            );
            self.canvas.fill_rect(
                key.left.round(),
                (y - TRAIL_HEIGHT).round(),
                key.width,
                TRAIL_HEIGHT,
                &paint,
                Blend::SourceOver,
                1.0,
            );
        }
    }

    /// Beams are taller and brighter for a short window after a note-on.
    fn draw_light_beams(&mut self, now: f64) {
        let y = self.impact_y;
        for i in 0..self.active.len() {
            let note = &self.active[i];
            let key = self.geometry(note.midi);
            let color = note.color;
            let freshness = self
                .activations
                .get(&note.midi)
                .map(|started| now - started)
                .filter(|elapsed| *elapsed < FRESH_NOTE_MS)
                .map(|elapsed| (1.0 - elapsed / FRESH_NOTE_MS) as f32)
                .unwrap_or(0.0);

            let height = 120.0 + 60.0 * freshness;
            let alpha = 0.15 + 0.25 * freshness;
            let paint = Paint::vertical(
                y - height,
                y,
                vec![(0.0, Rgb::WHITE.with_alpha(0.0)), (1.0, color.with_alpha(alpha))],
            );
            self.canvas.fill_rect(
                (key.left + 1.0).round(),
                (y - height).round(),
                key.width - 2.0,
                height,
                &paint,
                Blend::Lighter,
                1.0,
            );
        }
    }

    /// Accent-coloured rail with hot segments under sounding keys.
    fn draw_impact_rail(&mut self) {
        let y = (self.impact_y - RAIL_HEIGHT).round();
        let width = self.layout.total_width();
        let accent = self.profile.accent;

        self.canvas.fill_rect(0.0, y, width, RAIL_HEIGHT, &Paint::Solid(accent.with_alpha(0.15)), Blend::SourceOver, 1.0);
        self.canvas.fill_rect(0.0, y, width, 1.0, &Paint::Solid(accent.with_alpha(0.4)), Blend::SourceOver, 1.0);

        for i in 0..self.active.len() {
            let key = self.geometry(self.active[i].midi);
            let color = self.active[i].color;
            let core = Paint::vertical(
                y,
                y + RAIL_HEIGHT,
                vec![
                    (0.0, color.with_alpha(1.0)),
                    (0.5, Rgb::WHITE.with_alpha(1.0)),
                    (1.0, color.with_alpha(1.0)),
                ],
            );
            self.canvas.fill_rect(key.left.round(), y, key.width, RAIL_HEIGHT, &core, Blend::Lighter, 1.0);

            let halo = Paint::Radial {
                center: (key.center(), y + RAIL_HEIGHT / 2.0),
                radius: key.width,
                stops: vec![(0.0, color.with_alpha(0.5)), (1.0, Rgba::TRANSPARENT)],
            };
            self.canvas.fill_rect(
                (key.left - key.width / 2.0).round(),
                (y - 10.0).round(),
                key.width * 2.0,
                20.0,
                &halo,
                Blend::Lighter,
                1.0,
            );
        }
    }

    /// Quadratic ease-out over the flash lifetime.
    fn draw_flashes(&mut self, now: f64) {
        let y = (self.impact_y - FLASH_HEIGHT).round();
        for flash in &self.flashes {
            let elapsed = now - flash.started_ms;
            if elapsed >= IMPACT_FLASH_MS {
                continue;
            }
            let remaining = 1.0 - (elapsed / IMPACT_FLASH_MS) as f32;
            let alpha = 0.6 * remaining * remaining;
            let paint = Paint::Solid(flash.color.mix_white().with_alpha(alpha));
            self.canvas.fill_rect(flash.left.round(), y, flash.width, FLASH_HEIGHT, &paint, Blend::Lighter, 1.0);
        }
    }

    /// Linear afterglow where released keys were.
    fn draw_phosphor(&mut self, now: f64) {
        let y = self.impact_y;
        for i in 0..self.traces.len() {
            let trace = self.traces[i];
            let elapsed = now - trace.started_ms;
            if elapsed >= PHOSPHOR_MS {
                continue;
            }
            let alpha = 0.3 * (1.0 - (elapsed / PHOSPHOR_MS) as f32);
            let cx = self.geometry(trace.midi).center();
            let paint = Paint::Radial {
                center: (cx, y),
                radius: PHOSPHOR_RADIUS,
                stops: vec![
                    (0.0, PHOSPHOR_COLOR.with_alpha(alpha)),
                    (1.0, PHOSPHOR_COLOR.with_alpha(0.0)),
                ],
            };
            self.canvas.fill_rect(
                (cx - PHOSPHOR_RADIUS).round(),
                (y - PHOSPHOR_RADIUS).round(),
                PHOSPHOR_RADIUS * 2.0,
                PHOSPHOR_RADIUS * 2.0,
                &paint,
                Blend::Lighter,
                1.0,
            );
        }
    }

    fn apply_bloom(&mut self) {
        self.bloom.downsample_from(&self.canvas);
        let glow = self.bloom.resized(self.canvas.width(), self.canvas.height());
        let (w, h) = (self.canvas.width() as f32, self.canvas.height() as f32);

        let alpha = match self.profile.bloom {
            BloomProfile::Disabled => return,
            BloomProfile::Standard { alpha } => alpha,
            BloomProfile::Chromatic { alpha, fringe_alpha } => {
                self.canvas.draw_canvas(&glow, -1.0, 0.0, w, h, Blend::Lighter, fringe_alpha);
                self.canvas.draw_canvas(&glow, 1.0, 0.0, w, h, Blend::Lighter, fringe_alpha);
                alpha
            }
        };
        self.canvas.draw_canvas(&glow, 0.0, 0.0, w, h, Blend::Lighter, alpha);
    }

    fn draw_scanlines(&mut self) {
        let width = self.canvas.width() as f32;
        let line = Paint::Solid(Rgb::BLACK.with_alpha(0.04));
        for y in (0..self.canvas.height()).step_by(2) {
            self.canvas.fill_rect(0.0, y as f32, width, 1.0, &line, Blend::SourceOver, 1.0);
        }
    }
}

impl std::fmt::Debug for EffectsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectsEngine")
            .field("size", &(self.canvas.width(), self.canvas.height()))
            .field("theme", &self.theme)
            .field("running", &self.running)
            .field("is_playing", &self.is_playing)
            .field("active", &self.active.len())
            .field("particles", &self.particles)
            .finish()
    }
}

/// Seconds since the previous frame, capped so a suspended tab does not
/// produce one huge physics step.
fn step_dt(last_ms: Option<f64>, now_ms: f64) -> f32 {
    match last_ms {
        Some(last) => (((now_ms - last) / 1000.0) as f32).clamp(0.0, MAX_DT),
        None => FIRST_DT,
    }
}
