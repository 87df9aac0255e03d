// settings.rs - Persistent User Settings
//
// Stored as pretty JSON in the user's config directory. Every field has a
// default so older or hand-edited files keep loading.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ControllerOptions;
use crate::constants::{speed, timing, APP_NAME, DEFAULT_HOTKEY, FRAME_CACHE_BUDGET_BYTES};
use crate::layout::ScalingMode;
use crate::utils::{clamp_unit, parse_hex_color};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Image shown at startup
    pub image_path: Option<PathBuf>,

    /// Monitor the overlay covers
    pub display_index: usize,

    /// Toggle binding, e.g. `ctrl+alt+o`
    pub hotkey: String,

    pub opacity: f32,

    /// Animation speed in percent
    pub animation_speed: u32,

    pub scaling_mode: ScalingMode,
    pub scale_factor: f32,
    pub tile_scale: f32,
    pub enable_scale_limits: bool,

    /// `#RRGGBBAA` fill behind the image; fully transparent by default
    pub background_color: String,

    pub tick_interval_ms: u64,
    pub topmost_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            image_path: None,
            display_index: 0,
            hotkey: DEFAULT_HOTKEY.to_string(),
            opacity: 1.0,
            animation_speed: speed::DEFAULT,
            scaling_mode: ScalingMode::Fit,
            scale_factor: 1.0,
            tile_scale: 1.0,
            enable_scale_limits: true,
            background_color: "#00000000".to_string(),
            tick_interval_ms: timing::TICK_INTERVAL_MS,
            topmost_interval_ms: timing::TOPMOST_INTERVAL_MS,
        }
    }
}

impl Settings {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_NAME)
            .join("settings.json")
    }

    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Read settings from `path`; anything unreadable falls back to defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            info!("No settings at {:?}, using defaults", path);
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Settings>(&contents) {
                Ok(settings) => {
                    info!("Settings loaded from {:?}", path);
                    return settings.sanitized();
                }
                Err(e) => {
                    error!("Failed to parse settings: {}", e);
                }
            },
            Err(e) => {
                error!("Failed to read settings file: {}", e);
            }
        }
        Self::default()
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory {:?}", dir))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, json).with_context(|| format!("Failed to write settings to {:?}", path))?;
        info!("Settings saved to {:?}", path);
        Ok(())
    }

    /// Pull hand-edited values back into range
    fn sanitized(mut self) -> Self {
        self.opacity = clamp_unit(self.opacity);
        self.animation_speed = self.animation_speed.clamp(speed::MIN, speed::MAX);
        self.tick_interval_ms = self.tick_interval_ms.max(timing::MIN_TICK_INTERVAL_MS);
        self.topmost_interval_ms = self.topmost_interval_ms.max(timing::MIN_TOPMOST_INTERVAL_MS);
        if !self.scale_factor.is_finite() || self.scale_factor <= 0.0 {
            self.scale_factor = 1.0;
        }
        if !self.tile_scale.is_finite() || self.tile_scale <= 0.0 {
            self.tile_scale = 1.0;
        }
        self
    }

    /// Background as straight RGBA; invalid strings mean transparent
    pub fn background_rgba(&self) -> [u8; 4] {
        parse_hex_color(&self.background_color).unwrap_or_else(|| {
            warn!("Invalid background color '{}'", self.background_color);
            [0, 0, 0, 0]
        })
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            topmost_interval: Duration::from_millis(self.topmost_interval_ms),
            scale_limits: self.enable_scale_limits,
            background: self.background_rgba(),
            cache_budget: FRAME_CACHE_BUDGET_BYTES,
        }
    }
}
