//! Core library for the piano waterfall.
//!
//! Scores are flattened into a tick-indexed [`Timeline`]; a
//! [`TransportController`] and the per-frame [`SyncLoop`] keep the set of
//! sounding notes consistent with an external audio clock across seeks,
//! loops and rate changes, and an [`EffectsEngine`] renders particles, glow
//! and bloom for those notes onto a software [`Canvas`]. A [`Session`] owns
//! all of it for the score currently loaded.

pub mod audio;
pub mod colors;
pub mod config;
pub mod effects;
pub mod error;
pub mod keyboard;
pub mod particles;
pub mod render;
pub mod score;
pub mod session;
pub mod store;
pub mod sync;
pub mod theme;
pub mod timeline;
pub mod transport;
pub mod waterfall;

pub use audio::{AudioEngine, ClockEngine, NullSampler, Sampler};
pub use colors::{ColorSettings, SplitStrategy};
pub use config::{AppConfig, EffectsConfig, SyncConfig, TransportConfig};
pub use effects::{EffectsEngine, EffectsNote};
pub use error::{PianoError, Result};
pub use keyboard::{KeyGeometry, KeyboardLayout};
pub use particles::{EmitOptions, ParticleKind, ParticleSystem};
pub use render::{Canvas, Rgb};
pub use score::{Score, ScoreNote};
pub use session::Session;
pub use store::{JsonFileStore, MemoryStore, SnapshotStore};
pub use sync::{SyncLoop, SyncSnapshot};
pub use theme::Theme;
pub use timeline::{format_time, ActiveNote, ActiveNoteSet, PreviewNote, Tick, Timeline};
pub use transport::{validate_playback_rate, TransportController, TransportState};
pub use waterfall::WaterfallIndex;
