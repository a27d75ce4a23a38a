use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{particles::ParticleKind, render::Rgb, PianoError};

/// Visual theme selected by the surrounding application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Theme {
    #[default]
    #[serde(rename = "cool")]
    Cool,
    #[serde(rename = "warm")]
    Warm,
    #[serde(rename = "mono")]
    Mono,
    #[serde(rename = "8bit")]
    EightBit,
    #[serde(rename = "16bit")]
    SixteenBit,
    #[serde(rename = "hibit")]
    HiBit,
}

/// How the bloom pass composites the downscaled frame back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BloomProfile {
    Disabled,
    Standard { alpha: f32 },
    /// Two extra fringe passes offset by one pixel left and right.
    Chromatic { alpha: f32, fringe_alpha: f32 },
}

/// Theme-specific parameters read by the effects engine each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualProfile {
    /// Impact rail colour.
    pub accent: Rgb,
    /// Light-shaft and ambient spore colour.
    pub atmosphere: Rgb,
    pub bloom: BloomProfile,
    pub scanlines: bool,
    /// Afterglow traces on note release.
    pub phosphor: bool,
    /// Kind of the background particles drifting across the frame.
    pub ambient: ParticleKind,
    /// Kind shed by sustained notes.
    pub debris: ParticleKind,
}

impl Theme {
    pub const ALL: [Theme; 6] = [
        Theme::Cool,
        Theme::Warm,
        Theme::Mono,
        Theme::EightBit,
        Theme::SixteenBit,
        Theme::HiBit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Cool => "cool",
            Theme::Warm => "warm",
            Theme::Mono => "mono",
            Theme::EightBit => "8bit",
            Theme::SixteenBit => "16bit",
            Theme::HiBit => "hibit",
        }
    }

    pub fn profile(self) -> VisualProfile {
        let (accent, atmosphere) = match self {
            Theme::Cool => (0x38bdf8, 0x6366f1),
            Theme::Warm => (0xf59e0b, 0xf59e0b),
            Theme::Mono => (0x22c55e, 0x22c55e),
            Theme::EightBit => (0xe52521, 0xff3232),
            Theme::SixteenBit => (0xf08030, 0xf08030),
            Theme::HiBit => (0xff6188, 0xab9df2),
        };
        let bloom = match self {
            Theme::EightBit => BloomProfile::Disabled,
            Theme::Cool => BloomProfile::Chromatic {
                alpha: 0.5,
                fringe_alpha: 0.35,
            },
            Theme::HiBit => BloomProfile::Standard { alpha: 0.7 },
            _ => BloomProfile::Standard { alpha: 0.5 },
        };

        VisualProfile {
            accent: Rgb::from_u32(accent),
            atmosphere: Rgb::from_u32(atmosphere),
            bloom,
            scanlines: matches!(self, Theme::EightBit | Theme::SixteenBit | Theme::Mono),
            phosphor: self == Theme::Mono,
            ambient: match self {
                Theme::Warm => ParticleKind::Ember,
                Theme::Mono => ParticleKind::PhosphorFlicker,
                _ => ParticleKind::Spore,
            },
            debris: match self {
                Theme::EightBit | Theme::SixteenBit => ParticleKind::PixelDebris,
                _ => ParticleKind::Debris,
            },
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = PianoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Theme::ALL
            .into_iter()
            .find(|theme| theme.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| PianoError::msg(format!("unknown theme `{value}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_round_trip() {
        for theme in Theme::ALL {
            assert_eq!(theme.as_str().parse::<Theme>().unwrap(), theme);
            let json = serde_json::to_string(&theme).unwrap();
            assert_eq!(json, format!("\"{theme}\""));
        }
        assert!("neon".parse::<Theme>().is_err());
    }

    #[test]
    fn retro_profiles() {
        assert_eq!(Theme::EightBit.profile().bloom, BloomProfile::Disabled);
        assert!(Theme::EightBit.profile().scanlines);
        assert!(Theme::Mono.profile().phosphor);
        assert!(!Theme::Cool.profile().phosphor);
        assert!(!Theme::Warm.profile().scanlines);
        assert_eq!(Theme::SixteenBit.profile().debris, ParticleKind::PixelDebris);
        assert_eq!(Theme::Warm.profile().ambient, ParticleKind::Ember);
    }

    #[test]
    fn bloom_variants() {
        assert!(matches!(Theme::Cool.profile().bloom, BloomProfile::Chromatic { .. }));
        assert_eq!(Theme::HiBit.profile().bloom, BloomProfile::Standard { alpha: 0.7 });
        assert_eq!(Theme::Warm.profile().bloom, BloomProfile::Standard { alpha: 0.5 });
    }
}
