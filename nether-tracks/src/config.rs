//! Engine configuration (TOML)
//!
//! Everything the engine needs to know up front: tick rate, pool sizes and
//! the mix profile that decides fade curves and speech ducking.
//!
//! ```toml
//! callback_fps = 60
//! primary_tracks = 8
//! shadow_tracks = 8
//! preset = "equal_power"
//! ```
//!
//! A `[profile]` table overrides the preset field by field.
//!
//! The default `classic` preset has no speech ducking; pick `soft_attack`
//! or `equal_power`, or give a `[profile.ducking]` table, to duck music
//! under voice lines.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::MAX_VOLUME;
use crate::error::Result;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Scheduler ticks per second (default: 60)
    pub callback_fps: u32,
    /// Primary track slots (default: 8)
    pub primary_tracks: usize,
    /// Fade-shadow track slots (default: 8)
    pub shadow_tracks: usize,
    /// Sound id the radio chatter effect applies to (default: 10000)
    pub radio_chatter_sound: u32,
    /// Evict the lowest-priority primary track when the pool is full (default: true)
    pub priority_eviction: bool,
    /// Named mix profile (default: classic, which never ducks)
    pub preset: ProfilePreset,
    /// Explicit mix profile; wins over `preset` when present
    pub profile: Option<MixProfile>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            callback_fps: default_callback_fps(),
            primary_tracks: default_primary_tracks(),
            shadow_tracks: default_shadow_tracks(),
            radio_chatter_sound: default_radio_chatter_sound(),
            priority_eviction: true,
            preset: ProfilePreset::default(),
            profile: None,
        }
    }
}

fn default_callback_fps() -> u32 {
    60
}
fn default_primary_tracks() -> usize {
    8
}
fn default_shadow_tracks() -> usize {
    8
}
fn default_radio_chatter_sound() -> u32 {
    10_000
}

impl EngineConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        Ok(config.sanitized())
    }

    /// Load a configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Resolved mix profile
    pub fn mix_profile(&self) -> MixProfile {
        self.profile.clone().unwrap_or_else(|| self.preset.profile())
    }

    /// Clamp values that would stall the scheduler or leave the pools empty
    fn sanitized(mut self) -> Self {
        self.callback_fps = self.callback_fps.clamp(1, 1000);
        self.primary_tracks = self.primary_tracks.max(1);
        self
    }
}

/// Built-in mix profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProfilePreset {
    /// Linear fades, no ducking, unit mix
    #[default]
    Classic,
    /// Steep perceptual fade-ins, linear fade-outs, light ducking
    SoftAttack,
    /// Equal-power fades both ways, heavy ducking, boosted music
    EqualPower,
}

impl ProfilePreset {
    /// Profile values for this preset
    pub fn profile(self) -> MixProfile {
        match self {
            ProfilePreset::Classic => MixProfile::classic(),
            ProfilePreset::SoftAttack => MixProfile::soft_attack(),
            ProfilePreset::EqualPower => MixProfile::equal_power(),
        }
    }
}

/// Fade curve, ducking and mix-balance settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixProfile {
    /// Perceptual curve steepness for fade-ins (None = linear)
    pub fade_in_steepness: Option<f64>,
    /// Perceptual curve steepness for fade-outs (None = linear)
    pub fade_out_steepness: Option<f64>,
    /// A fade-out that reaches its target frees the track, even above zero
    pub release_on_fade_out_target: bool,
    /// Music gain reduction while speech plays (None = disabled)
    pub ducking: Option<DuckingConfig>,
    /// Output multiplier for music-group tracks
    pub music_mix: f32,
    /// Output multiplier for voice-group tracks
    pub voice_mix: f32,
    /// Output multiplier for sfx-group tracks
    pub sfx_mix: f32,
}

impl Default for MixProfile {
    fn default() -> Self {
        Self::classic()
    }
}

impl MixProfile {
    /// Linear fades, no ducking
    pub fn classic() -> Self {
        Self {
            fade_in_steepness: None,
            fade_out_steepness: None,
            release_on_fade_out_target: false,
            ducking: None,
            music_mix: 1.0,
            voice_mix: 1.0,
            sfx_mix: 1.0,
        }
    }

    /// Steep fade-ins, linear fade-outs, music ducked to 180/1000 of full scale
    pub fn soft_attack() -> Self {
        Self {
            fade_in_steepness: Some(6.0),
            fade_out_steepness: None,
            release_on_fade_out_target: false,
            ducking: Some(DuckingConfig {
                target: 127 * 180,
                ..DuckingConfig::default()
            }),
            music_mix: 1.5,
            voice_mix: 1.1,
            sfx_mix: 1.1,
        }
    }

    /// Equal-power fades, music ducked to 290/1000 of full scale
    pub fn equal_power() -> Self {
        Self {
            fade_in_steepness: Some(1.0),
            fade_out_steepness: Some(1.0),
            release_on_fade_out_target: true,
            ducking: Some(DuckingConfig {
                target: 127 * 290,
                ..DuckingConfig::default()
            }),
            music_mix: 1.9,
            voice_mix: 1.04,
            sfx_mix: 1.0,
        }
    }
}

/// Speech ducking parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuckingConfig {
    /// Gain reduction reached while speech plays (volume scale)
    pub target: i32,
    /// Ramp window in milliseconds
    pub window_ms: u32,
    /// Perceptual curve steepness for the ramp
    pub steepness: f64,
}

impl Default for DuckingConfig {
    fn default() -> Self {
        Self {
            target: MAX_VOLUME / 4,
            window_ms: 20,
            steepness: 2.0,
        }
    }
}
