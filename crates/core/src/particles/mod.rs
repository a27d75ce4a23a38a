//! Fixed-capacity particle pool with per-kind physics.
//!
//! Slots are allocated once and recycled; `emit` silently truncates when the
//! pool is exhausted. Positions are pixel-snapped when drawn.

use std::f32::consts::{FRAC_PI_2, PI};

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::render::{Blend, Canvas, Paint, Rgb};

pub const DEFAULT_POOL_CAPACITY: usize = 1200;
/// Downward acceleration in px/s^2.
pub const DEFAULT_GRAVITY: f32 = 80.0;

pub const Z_MIN: f32 = 0.0;
pub const Z_MAX: f32 = 3.0;
/// Depth of the impact plane; particles here are drawn at nominal size.
pub const PLAY_PLANE: f32 = 1.0;

const SHOCKWAVE_GROWTH: f32 = 90.0;
const SPORE_WIND: f32 = 12.0;
const SPORE_WIND_FREQ: f32 = 1.5;
const SPORE_RISE: f32 = 6.0;
const EMBER_LIFT: f32 = 0.4;
const EMBER_JITTER: f32 = 20.0;
const EMBER_FREQ: f32 = 9.0;
const PIXEL_DEBRIS_GRAVITY: f32 = 3.0;
const PHOSPHOR_DAMPING: f32 = 0.95;
const PHOSPHOR_TRAIL_SECS: f32 = 0.03;

/// Depth bands drawn back to front.
const DEPTH_BANDS: [(f32, f32); 3] = [(Z_MIN, 0.8), (0.8, 1.3), (1.3, f32::INFINITY)];

/// Parallax factor applied to speed and size.
pub fn z_scale(z: f32) -> f32 {
    0.5 + 0.5 * z
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParticleKind {
    #[default]
    Burst,
    Debris,
    Shockwave,
    Spore,
    Ember,
    PixelDebris,
    PhosphorFlicker,
}

impl ParticleKind {
    /// Debris falls; everything else is launched upwards.
    fn base_angle(self) -> f32 {
        match self {
            ParticleKind::Debris => FRAC_PI_2,
            _ => -FRAC_PI_2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub life: f32,
    pub max_life: f32,
    pub color: Rgb,
    pub size: f32,
    pub kind: ParticleKind,
    pub z: f32,
    pub gravity_multiplier: f32,
    /// Random phase for oscillating motion and flicker.
    pub phase: f32,
    pub active: bool,
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            life: 0.0,
            max_life: 0.0,
            color: Rgb::WHITE,
            size: 1.0,
            kind: ParticleKind::Burst,
            z: PLAY_PLANE,
            gravity_multiplier: 1.0,
            phase: 0.0,
            active: false,
        }
    }
}

impl Particle {
    fn age(&self) -> f32 {
        self.max_life - self.life
    }

    fn alpha(&self) -> f32 {
        if self.max_life <= 0.0 {
            0.0
        } else {
            (self.life / self.max_life).clamp(0.0, 1.0)
        }
    }
}

/// Parameters for one [`ParticleSystem::emit`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmitOptions {
    pub x: f32,
    pub y: f32,
    pub color: Rgb,
    pub count: usize,
    pub speed: f32,
    /// Cone width in radians around the kind's base direction.
    pub spread: f32,
    pub size: f32,
    /// Nominal lifetime in seconds; each particle gets 70-100% of it.
    pub lifetime: f32,
    pub kind: ParticleKind,
    pub z: f32,
    pub gravity_multiplier: f32,
}

impl EmitOptions {
    pub fn at(x: f32, y: f32, color: Rgb) -> Self {
        Self {
            x,
            y,
            color,
            count: 6,
            speed: 60.0,
            spread: PI * 0.6,
            size: 2.0,
            lifetime: 0.35,
            kind: ParticleKind::Burst,
            z: PLAY_PLANE,
            gravity_multiplier: 1.0,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_spread(mut self, spread: f32) -> Self {
        self.spread = spread;
        self
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    pub fn with_lifetime(mut self, lifetime: f32) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn with_kind(mut self, kind: ParticleKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_z(mut self, z: f32) -> Self {
        self.z = z;
        self
    }

    pub fn with_gravity(mut self, multiplier: f32) -> Self {
        self.gravity_multiplier = multiplier;
        self
    }
}

pub struct ParticleSystem {
    particles: Vec<Particle>,
    gravity: f32,
    rng: StdRng,
}

impl ParticleSystem {
    pub fn new() -> Self {
        Self::with_options(DEFAULT_POOL_CAPACITY, DEFAULT_GRAVITY, None)
    }

    /// `seed` makes emission deterministic; `None` seeds from the OS.
    pub fn with_options(capacity: usize, gravity: f32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            particles: vec![Particle::default(); capacity],
            gravity,
            rng,
        }
    }

    pub fn capacity(&self) -> usize {
        self.particles.len()
    }

    pub fn gravity(&self) -> f32 {
        self.gravity
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn active_count(&self) -> usize {
        self.particles.iter().filter(|p| p.active).count()
    }

    pub fn active_count_of(&self, kind: ParticleKind) -> usize {
        self.particles
            .iter()
            .filter(|p| p.active && p.kind == kind)
            .count()
    }

    /// Activates up to `opts.count` free slots and returns how many were
    /// actually emitted.
    pub fn emit(&mut self, opts: EmitOptions) -> usize {
        let z = opts.z.clamp(Z_MIN, Z_MAX);
        let scale = z_scale(z);
        let base_angle = opts.kind.base_angle();
        let mut emitted = 0;

        for _ in 0..opts.count {
            let Some(slot) = self.particles.iter().position(|p| !p.active) else {
                break;
            };

            let angle = base_angle + (self.rng.random::<f32>() - 0.5) * opts.spread;
            let speed = opts.speed * (0.5 + self.rng.random::<f32>() * 0.5) * scale;
            let life = opts.lifetime * (0.7 + self.rng.random::<f32>() * 0.3);
            let phase = self.rng.random::<f32>() * PI * 2.0;

            self.particles[slot] = Particle {
                x: opts.x,
                y: opts.y,
                vx: angle.cos() * speed,
                vy: angle.sin() * speed,
                life,
                max_life: life,
                color: opts.color,
                size: opts.size,
                kind: opts.kind,
                z,
                gravity_multiplier: opts.gravity_multiplier,
                phase,
                active: true,
            };
            emitted += 1;
        }

        emitted
    }

    /// Advances every live particle by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        let gravity = self.gravity;
        for p in self.particles.iter_mut().filter(|p| p.active) {
            p.life -= dt;
            if p.life <= 0.0 {
                p.active = false;
                continue;
            }

            let scale = z_scale(p.z);
            match p.kind {
                ParticleKind::Burst | ParticleKind::Debris => {
                    p.vy += gravity * p.gravity_multiplier * scale * dt;
                    p.x += p.vx * dt;
                    p.y += p.vy * dt;
                }
                ParticleKind::Shockwave => {
                    p.size += SHOCKWAVE_GROWTH * scale * dt;
                }
                ParticleKind::Spore => {
                    let wind = (p.phase + p.age() * SPORE_WIND_FREQ).sin() * SPORE_WIND * scale;
                    p.x += (p.vx + wind) * dt;
                    p.y += (p.vy - SPORE_RISE * scale) * dt;
                }
                ParticleKind::Ember => {
                    p.vy -= gravity * EMBER_LIFT * p.gravity_multiplier * dt;
                    let jitter = (p.phase + p.age() * EMBER_FREQ).sin() * EMBER_JITTER;
                    p.x += (p.vx + jitter) * dt;
                    p.y += p.vy * dt;
                }
                ParticleKind::PixelDebris => {
                    p.vy += gravity * PIXEL_DEBRIS_GRAVITY * p.gravity_multiplier * scale * dt;
                    p.x += p.vx * dt;
                    p.y += p.vy * dt;
                }
                ParticleKind::PhosphorFlicker => {
                    p.vx *= PHOSPHOR_DAMPING;
                    p.vy *= PHOSPHOR_DAMPING;
                    p.x += p.vx * dt;
                    p.y += p.vy * dt;
                }
            }
        }
    }

    /// Draws live particles additively in back, mid and front depth passes.
    pub fn draw(&self, canvas: &mut Canvas) {
        if !self.particles.iter().any(|p| p.active) {
            return;
        }
        for (near, far) in DEPTH_BANDS {
            for p in self
                .particles
                .iter()
                .filter(|p| p.active && p.z >= near && p.z < far)
            {
                draw_particle(canvas, p);
            }
        }
    }

    /// Deactivates every particle; the pool itself is kept.
    pub fn clear(&mut self) {
        for p in &mut self.particles {
            p.active = false;
        }
    }
}

impl Default for ParticleSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ParticleSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticleSystem")
            .field("capacity", &self.capacity())
            .field("active", &self.active_count())
            .field("gravity", &self.gravity)
            .finish()
    }
}

fn draw_particle(canvas: &mut Canvas, p: &Particle) {
    let alpha = p.alpha();
    let size = (p.size * z_scale(p.z)).round().max(1.0);
    let (x, y) = (p.x.round(), p.y.round());
    let solid = Paint::Solid(p.color.with_alpha(1.0));

    match p.kind {
        ParticleKind::Shockwave => {
            canvas.stroke_circle(p.x, p.y, p.size, 1.5, p.color.with_alpha(1.0), Blend::Lighter, alpha * 0.8);
        }
        ParticleKind::Ember => {
            let halo = size * 3.0;
            canvas.fill_rect(x + size / 2.0 - halo / 2.0, y + size / 2.0 - halo / 2.0, halo, halo, &solid, Blend::Lighter, alpha * 0.25);
            canvas.fill_rect(x, y, size, size, &solid, Blend::Lighter, alpha);
        }
        ParticleKind::PixelDebris => {
            canvas.fill_rect(x, y, size, size, &solid, Blend::Lighter, alpha);
            let highlight = Paint::Solid(p.color.mix_white().with_alpha(1.0));
            canvas.fill_rect(x, y, size, 1.0, &highlight, Blend::Lighter, alpha);
        }
        ParticleKind::PhosphorFlicker => {
            let flicker = 0.6 + 0.4 * (0.5 + 0.5 * (p.phase + p.age() * 40.0).sin());
            let tx = (p.x - p.vx * PHOSPHOR_TRAIL_SECS).round();
            let ty = (p.y - p.vy * PHOSPHOR_TRAIL_SECS).round();
            canvas.fill_rect(tx, ty, size, size, &solid, Blend::Lighter, alpha * flicker * 0.4);
            canvas.fill_rect(x, y, size, size, &solid, Blend::Lighter, alpha * flicker);
        }
        ParticleKind::Burst | ParticleKind::Debris | ParticleKind::Spore => {
            canvas.fill_rect(x, y, size, size, &solid, Blend::Lighter, alpha);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgb = Rgb::WHITE;

    fn system(gravity: f32) -> ParticleSystem {
        ParticleSystem::with_options(DEFAULT_POOL_CAPACITY, gravity, Some(7))
    }

    fn first_active(ps: &mut ParticleSystem) -> &mut Particle {
        ps.particles_mut().iter_mut().find(|p| p.active).unwrap()
    }

    #[test]
    fn starts_with_zero_active_particles() {
        assert_eq!(system(DEFAULT_GRAVITY).active_count(), 0);
    }

    #[test]
    fn emits_requested_and_default_counts() {
        let mut ps = system(DEFAULT_GRAVITY);
        assert_eq!(ps.emit(EmitOptions::at(100.0, 200.0, WHITE).with_count(8)), 8);
        assert_eq!(ps.active_count(), 8);

        ps.emit(EmitOptions::at(0.0, 0.0, WHITE));
        assert_eq!(ps.active_count(), 14);
    }

    #[test]
    fn particles_die_after_lifetime() {
        let mut ps = system(DEFAULT_GRAVITY);
        ps.emit(EmitOptions::at(0.0, 0.0, WHITE).with_count(3).with_lifetime(0.1));
        ps.update(0.05);
        ps.update(0.06);
        assert_eq!(ps.active_count(), 0);
    }

    #[test]
    fn velocity_moves_particles() {
        let mut ps = system(0.0);
        ps.emit(EmitOptions::at(50.0, 50.0, WHITE).with_count(1).with_speed(0.0).with_lifetime(1.0));
        let p = first_active(&mut ps);
        p.vx = 100.0;
        p.vy = 0.0;

        ps.update(0.1);
        let p = first_active(&mut ps);
        assert!((p.x - 60.0).abs() < 1e-3);
    }

    #[test]
    fn gravity_pulls_bursts_down() {
        let mut ps = system(200.0);
        ps.emit(EmitOptions::at(0.0, 0.0, WHITE).with_count(1).with_speed(0.0).with_lifetime(2.0));
        let p = first_active(&mut ps);
        p.vx = 0.0;
        p.vy = 0.0;

        ps.update(0.1);
        assert!((first_active(&mut ps).vy - 20.0).abs() < 1e-3);
    }

    #[test]
    fn depth_scales_gravity() {
        let mut ps = system(100.0);
        ps.emit(EmitOptions::at(0.0, 0.0, WHITE).with_count(1).with_speed(0.0).with_lifetime(2.0).with_z(3.0));
        ps.update(0.1);
        // z = 3 gives a parallax factor of 2.
        assert!((first_active(&mut ps).vy - 20.0).abs() < 1e-3);
    }

    #[test]
    fn debris_launches_downwards_and_bursts_upwards() {
        let mut ps = system(0.0);
        ps.emit(EmitOptions::at(0.0, 0.0, WHITE).with_count(20).with_spread(0.5).with_kind(ParticleKind::Debris));
        ps.emit(EmitOptions::at(0.0, 0.0, WHITE).with_count(20).with_spread(0.5));
        for p in ps.particles().iter().filter(|p| p.active) {
            match p.kind {
                ParticleKind::Debris => assert!(p.vy > 0.0),
                _ => assert!(p.vy < 0.0),
            }
        }
    }

    #[test]
    fn shockwaves_grow_without_moving() {
        let mut ps = system(DEFAULT_GRAVITY);
        ps.emit(EmitOptions::at(10.0, 10.0, WHITE).with_count(1).with_speed(0.0).with_size(6.0).with_lifetime(1.0).with_kind(ParticleKind::Shockwave));
        ps.update(0.1);
        let p = first_active(&mut ps);
        assert_eq!((p.x, p.y), (10.0, 10.0));
        assert!(p.size > 6.0);
    }

    #[test]
    fn spores_and_embers_rise() {
        let mut ps = system(DEFAULT_GRAVITY);
        ps.emit(EmitOptions::at(0.0, 100.0, WHITE).with_count(1).with_speed(0.0).with_lifetime(5.0).with_kind(ParticleKind::Spore));
        ps.emit(EmitOptions::at(0.0, 100.0, WHITE).with_count(1).with_speed(0.0).with_lifetime(5.0).with_kind(ParticleKind::Ember));
        for _ in 0..10 {
            ps.update(0.05);
        }
        for p in ps.particles().iter().filter(|p| p.active) {
            assert!(p.y < 100.0, "{:?} did not rise", p.kind);
        }
    }

    #[test]
    fn pixel_debris_falls_faster_than_debris() {
        let mut ps = system(100.0);
        for kind in [ParticleKind::Debris, ParticleKind::PixelDebris] {
            ps.emit(EmitOptions::at(0.0, 0.0, WHITE).with_count(1).with_speed(0.0).with_lifetime(2.0).with_kind(kind));
        }
        ps.update(0.1);
        let vy = |kind: ParticleKind| ps.particles().iter().find(|p| p.active && p.kind == kind).unwrap().vy;
        assert!(vy(ParticleKind::PixelDebris) > vy(ParticleKind::Debris) * 2.0);
    }

    #[test]
    fn phosphor_flicker_is_damped() {
        let mut ps = system(DEFAULT_GRAVITY);
        ps.emit(EmitOptions::at(0.0, 0.0, WHITE).with_count(1).with_lifetime(2.0).with_kind(ParticleKind::PhosphorFlicker));
        let p = first_active(&mut ps);
        p.vx = 100.0;
        p.vy = 0.0;
        ps.update(0.016);
        assert!((first_active(&mut ps).vx - 95.0).abs() < 1e-3);
    }

    #[test]
    fn clear_deactivates_without_shrinking() {
        let mut ps = system(DEFAULT_GRAVITY);
        ps.emit(EmitOptions::at(0.0, 0.0, WHITE).with_count(10));
        ps.clear();
        assert_eq!(ps.active_count(), 0);
        assert_eq!(ps.capacity(), DEFAULT_POOL_CAPACITY);
    }

    #[test]
    fn pool_recycles_dead_slots() {
        let mut ps = system(DEFAULT_GRAVITY);
        ps.emit(EmitOptions::at(0.0, 0.0, WHITE).with_count(5).with_lifetime(0.01));
        ps.update(0.1);
        assert_eq!(ps.active_count(), 0);
        ps.emit(EmitOptions::at(0.0, 0.0, WHITE).with_count(5).with_lifetime(1.0));
        assert_eq!(ps.active_count(), 5);
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut ps = ParticleSystem::with_options(50, DEFAULT_GRAVITY, Some(1));
        let mut emitted = 0;
        for _ in 0..100 {
            emitted += ps.emit(EmitOptions::at(0.0, 0.0, WHITE).with_count(10).with_lifetime(10.0));
        }
        assert_eq!(emitted, 50);
        assert_eq!(ps.active_count(), 50);
        assert_eq!(ps.capacity(), 50);
    }

    #[test]
    fn large_steps_stay_finite() {
        let mut ps = system(100.0);
        ps.emit(EmitOptions::at(0.0, 0.0, WHITE).with_count(1).with_speed(50.0).with_lifetime(5.0));
        ps.update(2.0);
        let p = first_active(&mut ps);
        assert!(p.x.is_finite() && p.y.is_finite());
    }

    #[test]
    fn draw_skips_empty_pool_and_paints_live_particles() {
        let mut canvas = Canvas::new(32, 32);
        let mut ps = system(0.0);
        ps.draw(&mut canvas);
        assert!(canvas.to_rgba8().iter().all(|&b| b == 0));

        ps.emit(EmitOptions::at(10.0, 10.0, WHITE).with_count(1).with_speed(0.0).with_size(2.0));
        ps.draw(&mut canvas);
        assert!(canvas.pixel(10, 10).unwrap()[3] > 0.0);
    }
}
