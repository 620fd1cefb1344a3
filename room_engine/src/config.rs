use std::fs;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest audio fade a preset may ask for.
pub const MAX_FADE_SECS: f32 = 60.0;
/// Upper bound for the popup throttle, popup stagger and scene settle delays.
pub const MAX_DELAY_MS: u64 = 60_000;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("room dimensions must be positive (got {width}x{depth})")]
    Room { width: f32, depth: f32 },
    #[error("viewport must be non-empty (got {width}x{height})")]
    Viewport { width: u32, height: u32 },
    #[error("placement_attempts must be at least 1")]
    PlacementAttempts,
    #[error("{field} must be between 0 and {max} seconds (got {value})", max = MAX_FADE_SECS)]
    Fade { field: &'static str, value: f32 },
    #[error("{field} must be at most {max} ms (got {value})", max = MAX_DELAY_MS)]
    Delay { field: &'static str, value: u64 },
}

/// Tunables for the room, popup layout and audio mix. Every field has a
/// default matching the shipped scene, so a preset JSON only needs the values
/// it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    pub room: RoomDimensions,
    pub popups: PopupConfig,
    pub audio: AudioConfig,
    pub scenes: SceneConfig,
    pub viewport: Viewport,
    pub compact: bool,
    pub seed: u64,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            room: RoomDimensions::default(),
            popups: PopupConfig::default(),
            audio: AudioConfig::default(),
            scenes: SceneConfig::default(),
            viewport: Viewport::default(),
            compact: false,
            seed: 0x5eed,
        }
    }
}

impl RoomConfig {
    pub fn from_json_file(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading room config {}", path.display()))?;
        let config: RoomConfig = serde_json::from_str(&data)
            .with_context(|| format!("parsing room config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let room = &self.room;
        if !(room.width.is_finite() && room.depth.is_finite() && room.width > 0.0 && room.depth > 0.0)
        {
            return Err(ConfigError::Room {
                width: room.width,
                depth: room.depth,
            });
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(ConfigError::Viewport {
                width: self.viewport.width,
                height: self.viewport.height,
            });
        }
        if self.popups.placement_attempts == 0 {
            return Err(ConfigError::PlacementAttempts);
        }
        for (field, value) in [
            ("fade_out_secs", self.audio.fade_out_secs),
            ("fade_in_secs", self.audio.fade_in_secs),
            ("rooftop_fade_out_secs", self.audio.rooftop_fade_out_secs),
        ] {
            if !(0.0..=MAX_FADE_SECS).contains(&value) {
                return Err(ConfigError::Fade { field, value });
            }
        }
        for (field, value) in [
            ("throttle_ms", self.popups.throttle_ms),
            ("stagger_ms", self.popups.stagger_ms),
            ("settle_ms", self.scenes.settle_ms),
        ] {
            if value > MAX_DELAY_MS {
                return Err(ConfigError::Delay { field, value });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomDimensions {
    pub width: f32,
    pub depth: f32,
    pub eye_height: f32,
    pub wall_margin: f32,
}

impl RoomDimensions {
    pub fn half_width(&self) -> f32 {
        self.width / 2.0
    }

    pub fn half_depth(&self) -> f32 {
        self.depth / 2.0
    }
}

impl Default for RoomDimensions {
    fn default() -> Self {
        Self {
            width: 40.0,
            depth: 20.0,
            eye_height: 1.6,
            wall_margin: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopupConfig {
    pub throttle_ms: u64,
    pub stagger_ms: u64,
    pub width: f32,
    pub height: f32,
    pub screen_padding: f32,
    pub overlap_margin: f32,
    pub placement_attempts: u32,
    pub compact_slice_height: f32,
}

impl Default for PopupConfig {
    fn default() -> Self {
        Self {
            throttle_ms: 1000,
            stagger_ms: 800,
            width: 350.0,
            height: 80.0,
            screen_padding: 50.0,
            overlap_margin: 20.0,
            placement_attempts: 20,
            compact_slice_height: 70.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmitterConfig {
    pub position: [f32; 3],
    pub falloff: f32,
    pub max_gain: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub tension_max: f32,
    pub ambient_max: f32,
    pub rooftop_gain: f32,
    pub river: EmitterConfig,
    pub fires: Vec<EmitterConfig>,
    pub fade_out_secs: f32,
    pub fade_in_secs: f32,
    pub rooftop_fade_out_secs: f32,
    /// Channels whose loop asset failed to load; they stay silent.
    pub missing_assets: Vec<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            tension_max: 0.02,
            ambient_max: 0.5,
            rooftop_gain: 0.3,
            river: EmitterConfig {
                position: [12.0, 0.0, 0.0],
                falloff: 10.0,
                max_gain: 0.4,
            },
            fires: vec![
                EmitterConfig {
                    position: [-8.0, 0.5, -5.0],
                    falloff: 8.0,
                    max_gain: 0.5,
                },
                EmitterConfig {
                    position: [-15.0, 0.5, 5.0],
                    falloff: 8.0,
                    max_gain: 0.5,
                },
            ],
            fade_out_secs: 0.5,
            fade_in_secs: 1.0,
            rooftop_fade_out_secs: 1.0,
            missing_assets: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub settle_ms: u64,
    pub interaction_reach: f32,
    pub rooftop_half_extent: f32,
    pub rooftop_eye_height: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            settle_ms: 100,
            interaction_reach: 25.0,
            rooftop_half_extent: 13.0,
            rooftop_eye_height: 101.6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

impl Viewport {
    /// Parses `WIDTHxHEIGHT` as accepted by `--viewport`.
    pub fn parse(value: &str) -> Result<Self> {
        let (width, height) = value
            .trim()
            .split_once(|c: char| c == 'x' || c == 'X')
            .with_context(|| format!("viewport '{value}' is not WIDTHxHEIGHT"))?;
        let width: u32 = width
            .parse()
            .with_context(|| format!("parsing viewport width '{width}'"))?;
        let height: u32 = height
            .parse()
            .with_context(|| format!("parsing viewport height '{height}'"))?;
        ensure!(width > 0 && height > 0, "viewport must be non-empty");
        Ok(Self { width, height })
    }
}
