// app/state.rs - Core Overlay State
//
// The single source of truth for what the overlay shows. Only the
// controller mutates it; the UI layer reads it for status display.

use crate::constants::speed;
use crate::layout::ScalingMode;
use crate::media::OverlayImage;

/// Coarse state of the overlay window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayPhase {
    /// Window unmapped (it still exists)
    Hidden,
    /// Window shown with a single-frame image, or nothing loaded yet
    VisibleStatic,
    /// Window shown and the animation timer running
    VisibleAnimating,
}

#[derive(Debug)]
pub struct OverlayState {
    /// Whether the overlay window is mapped
    pub visible: bool,

    /// The image being shown; None until the first successful load
    pub active_image: Option<OverlayImage>,

    /// Index into `active_image.frames`
    pub current_frame_index: usize,

    /// Whole-window opacity in [0, 1]
    pub opacity: f32,

    /// How the image is fitted to the display
    pub scaling_mode: ScalingMode,

    /// Extra scale applied in fit/stretch/center modes
    pub scale_factor: f32,

    /// Tile size multiplier in tile mode
    pub tile_scale: f32,

    /// Animation playback speed in percent
    pub animation_speed: u32,

    /// Edit mode turns click-through off so the overlay can be dragged
    pub edit_mode: bool,

    /// Message of the most recent recoverable error, for status display
    pub last_error: Option<String>,
}

impl Default for OverlayState {
    fn default() -> Self {
        Self {
            visible: false,
            active_image: None,
            current_frame_index: 0,
            opacity: 1.0,
            scaling_mode: ScalingMode::Fit,
            scale_factor: 1.0,
            tile_scale: 1.0,
            animation_speed: speed::DEFAULT,
            edit_mode: false,
            last_error: None,
        }
    }
}

impl OverlayState {
    pub fn is_animated(&self) -> bool {
        self.active_image
            .as_ref()
            .is_some_and(OverlayImage::is_animated)
    }

    pub fn phase(&self) -> OverlayPhase {
        match (self.visible, self.is_animated()) {
            (false, _) => OverlayPhase::Hidden,
            (true, false) => OverlayPhase::VisibleStatic,
            (true, true) => OverlayPhase::VisibleAnimating,
        }
    }

    /// One-line status for tooltips
    pub fn status_line(&self) -> String {
        let image = self
            .active_image
            .as_ref()
            .and_then(|i| i.source_path().file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "no image".to_string());
        let shown = if self.visible { "shown" } else { "hidden" };
        format!("{} ({}, {:.0}%)", image, shown, self.opacity * 100.0)
    }
}
