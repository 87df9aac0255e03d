// platform/fallback.rs - Non-Windows Overlay Surface
//
// Uses only what winit offers: an undecorated always-on-top window with
// cursor hit-testing disabled. There is no per-pixel alpha upload here, so
// present() only tracks what would be shown.

use image::RgbaImage;
use log::{info, warn};
use winit::{
    dpi::{PhysicalPosition, PhysicalSize},
    event_loop::ActiveEventLoop,
    window::{Window, WindowAttributes, WindowLevel},
};

use super::PlatformOverlaySurface;
use crate::constants::APP_NAME;
use crate::error::{OverlayError, Result};
use crate::layout::ScreenRect;

pub struct WinitSurface {
    window: Window,
    bounds: ScreenRect,
    warned_present: bool,
}

impl WinitSurface {
    pub fn create(event_loop: &ActiveEventLoop, bounds: ScreenRect) -> Result<Self> {
        let attributes = WindowAttributes::default()
            .with_title(APP_NAME)
            .with_position(PhysicalPosition::new(bounds.x, bounds.y))
            .with_inner_size(PhysicalSize::new(bounds.width.max(1), bounds.height.max(1)))
            .with_decorations(false)
            .with_transparent(true)
            .with_resizable(false)
            .with_visible(false)
            .with_window_level(WindowLevel::AlwaysOnTop);

        let window = event_loop
            .create_window(attributes)
            .map_err(|e| OverlayError::WindowInit(e.to_string()))?;

        info!("Overlay window created with ID: {:?}", window.id());

        Ok(Self {
            window,
            bounds,
            warned_present: false,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }
}

impl PlatformOverlaySurface for WinitSurface {
    fn initialize(&mut self) -> Result<()> {
        self.set_click_through(true);
        Ok(())
    }

    fn show(&mut self) {
        self.window.set_visible(true);
    }

    fn hide(&mut self) {
        self.window.set_visible(false);
    }

    fn reassert_topmost(&mut self) {
        self.window.set_window_level(WindowLevel::AlwaysOnTop);
    }

    fn set_click_through(&mut self, click_through: bool) {
        if let Err(e) = self.window.set_cursor_hittest(!click_through) {
            warn!("Click-through is not supported here: {}", e);
        }
    }

    fn set_bounds(&mut self, bounds: ScreenRect) {
        if self.bounds == bounds {
            return;
        }
        self.bounds = bounds;
        self.window
            .set_outer_position(PhysicalPosition::new(bounds.x, bounds.y));
        let _ = self
            .window
            .request_inner_size(PhysicalSize::new(bounds.width, bounds.height));
    }

    fn bounds(&self) -> ScreenRect {
        self.bounds
    }

    fn set_alpha(&mut self, _alpha: u8) {}

    fn present(&mut self, canvas: &RgbaImage, _alpha: u8) {
        if !self.warned_present {
            warn!(
                "Per-pixel alpha presentation is only implemented on Windows; {}x{} frame not shown",
                canvas.width(),
                canvas.height()
            );
            self.warned_present = true;
        }
        self.window.request_redraw();
    }
}
