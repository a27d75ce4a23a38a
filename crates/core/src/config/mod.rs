use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ColorSettings, Result, SplitStrategy, Theme};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub transport: TransportConfig,
    pub sync: SyncConfig,
    pub effects: EffectsConfig,
    pub colors: ColorSettings,
    /// Hand assignment, beside `colors` whose own `split` is the on/off flag.
    pub split: SplitStrategy,
}

impl AppConfig {
    /// Reads a JSON config file. Missing sections keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub default_rate: f64,
    /// Minimum loop length in beats; shorter regions disable looping.
    pub loop_epsilon_beats: f64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            default_rate: 1.0,
            loop_epsilon_beats: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Look-ahead for preview notes, in seconds of score time at the base
    /// tempo.
    pub preview_lookahead_secs: f64,
    /// Tick distance after which the preview is recomputed even if no note
    /// changed.
    pub preview_tick_threshold: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            preview_lookahead_secs: 0.5,
            preview_tick_threshold: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsConfig {
    pub theme: Theme,
    pub pool_capacity: usize,
    /// Size of the bloom buffer relative to the main canvas.
    pub bloom_scale: f32,
    pub debris_cooldown_ms: f64,
    pub hitstop: HitstopConfig,
    /// Seed for particle randomness; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            pool_capacity: crate::particles::DEFAULT_POOL_CAPACITY,
            bloom_scale: 0.25,
            debris_cooldown_ms: 250.0,
            hitstop: HitstopConfig::default(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitstopConfig {
    pub enabled: bool,
    pub duration_ms: f64,
    pub cooldown_ms: f64,
    /// Fraction of full velocity (127) a note-on must reach.
    pub velocity_threshold: f32,
}

impl Default for HitstopConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_ms: 35.0,
            cooldown_ms: 200.0,
            velocity_threshold: 0.8,
        }
    }
}
