// platform/mod.rs - Platform Abstraction Layer
//
// The overlay controller only talks to a PlatformOverlaySurface. Windows has
// the real implementation (layered, topmost, click-through Win32 window).
// Other targets get a winit-only fallback so the crate builds and the core
// can be exercised; it cannot do per-pixel alpha presentation.
//
// Overlays cannot appear above exclusive-fullscreen applications: those
// bypass the desktop compositor entirely. That is a property of the display
// pipeline, not something a surface implementation can work around.

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(not(target_os = "windows"))]
pub mod fallback;

#[cfg(target_os = "windows")]
pub use self::windows::Win32Surface as NativeSurface;

#[cfg(not(target_os = "windows"))]
pub use self::fallback::WinitSurface as NativeSurface;

use image::RgbaImage;
use winit::event_loop::ActiveEventLoop;

use crate::constants::display::{FALLBACK_HEIGHT, FALLBACK_WIDTH};
use crate::error::Result;
use crate::layout::ScreenRect;

/// Capabilities the overlay needs from the OS window manager
pub trait PlatformOverlaySurface {
    /// Apply frameless, layered, click-through and topmost attributes.
    /// Failure here is fatal for the overlay.
    fn initialize(&mut self) -> Result<()>;

    /// Map the window without activating it
    fn show(&mut self);

    /// Unmap the window; it is kept alive for the next show
    fn hide(&mut self);

    /// Put the window back on top of the topmost band
    fn reassert_topmost(&mut self);

    /// Toggle input transparency (mouse and keyboard pass through)
    fn set_click_through(&mut self, click_through: bool);

    /// Move and resize the window
    fn set_bounds(&mut self, bounds: ScreenRect);

    fn bounds(&self) -> ScreenRect;

    /// Change the whole-window alpha without re-uploading pixels
    fn set_alpha(&mut self, alpha: u8);

    /// Upload a premultiplied BGRA canvas matching `bounds()` and show it
    /// with the given whole-window alpha
    fn present(&mut self, canvas: &RgbaImage, alpha: u8);
}

/// Screen rectangle of monitor `index`, falling back to the primary monitor
pub fn monitor_rect(event_loop: &ActiveEventLoop, index: usize) -> ScreenRect {
    let monitor = event_loop
        .available_monitors()
        .nth(index)
        .or_else(|| event_loop.primary_monitor())
        .or_else(|| event_loop.available_monitors().next());

    match monitor {
        Some(m) => {
            let pos = m.position();
            let size = m.size();
            ScreenRect::new(pos.x, pos.y, size.width, size.height)
        }
        None => {
            log::warn!("No monitors reported, assuming {}x{}", FALLBACK_WIDTH, FALLBACK_HEIGHT);
            ScreenRect::new(0, 0, FALLBACK_WIDTH, FALLBACK_HEIGHT)
        }
    }
}

/// Number of monitors currently attached
pub fn monitor_count(event_loop: &ActiveEventLoop) -> usize {
    event_loop.available_monitors().count()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::OverlayError;

    /// Calls recorded by RecordingSurface
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum SurfaceCall {
        Initialize,
        Show,
        Hide,
        ReassertTopmost,
        ClickThrough(bool),
        Bounds(ScreenRect),
        Alpha(u8),
        Present { width: u32, height: u32, alpha: u8 },
    }

    /// Test double that records every call
    #[derive(Debug, Default)]
    pub struct RecordingSurface {
        pub calls: Vec<SurfaceCall>,
        pub bounds: ScreenRect,
        pub fail_init: bool,
    }

    impl RecordingSurface {
        pub fn failing() -> Self {
            Self {
                fail_init: true,
                ..Default::default()
            }
        }

        pub fn count(&self, pred: impl Fn(&SurfaceCall) -> bool) -> usize {
            self.calls.iter().filter(|c| pred(c)).count()
        }

        pub fn last_present(&self) -> Option<&SurfaceCall> {
            self.calls
                .iter()
                .rev()
                .find(|c| matches!(c, SurfaceCall::Present { .. }))
        }
    }

    impl PlatformOverlaySurface for RecordingSurface {
        fn initialize(&mut self) -> Result<()> {
            if self.fail_init {
                return Err(OverlayError::WindowInit("compositor unavailable".into()));
            }
            self.calls.push(SurfaceCall::Initialize);
            Ok(())
        }

        fn show(&mut self) {
            self.calls.push(SurfaceCall::Show);
        }

        fn hide(&mut self) {
            self.calls.push(SurfaceCall::Hide);
        }

        fn reassert_topmost(&mut self) {
            self.calls.push(SurfaceCall::ReassertTopmost);
        }

        fn set_click_through(&mut self, click_through: bool) {
            self.calls.push(SurfaceCall::ClickThrough(click_through));
        }

        fn set_bounds(&mut self, bounds: ScreenRect) {
            self.bounds = bounds;
            self.calls.push(SurfaceCall::Bounds(bounds));
        }

        fn bounds(&self) -> ScreenRect {
            self.bounds
        }

        fn set_alpha(&mut self, alpha: u8) {
            self.calls.push(SurfaceCall::Alpha(alpha));
        }

        fn present(&mut self, canvas: &RgbaImage, alpha: u8) {
            self.calls.push(SurfaceCall::Present {
                width: canvas.width(),
                height: canvas.height(),
                alpha,
            });
        }
    }
}
