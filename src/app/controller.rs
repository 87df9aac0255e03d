// app/controller.rs - Overlay Window Controller
//
// Owns the overlay state and the platform surface, and is the only thing
// that touches either. Everything runs on the UI thread: commands come in
// from the tray/hotkey glue, and the event loop calls on_wakeup() when the
// deadline from next_wakeup() passes.
//
//   Hidden --toggle--> VisibleStatic | VisibleAnimating (by frame count)
//   Visible* --toggle--> Hidden (window unmapped, timer cancelled)
//   set_active_image never changes visibility; while visible it moves
//   between VisibleStatic and VisibleAnimating and (re)starts or stops
//   the animation timer.

use std::path::Path;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::state::{OverlayPhase, OverlayState};
use crate::animation::{AnimationClock, AnimationTimer, TimerToken};
use crate::constants::{scale, speed, timing, FRAME_CACHE_BUDGET_BYTES};
use crate::error::Result;
use crate::layout::{FrameCache, Layout, LayoutParams, ScalingMode, ScreenRect};
use crate::media::OverlayImage;
use crate::platform::PlatformOverlaySurface;
use crate::utils::{clamp_unit, opacity_to_alpha};

/// Tunables that don't change the state machine
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Animation timer period
    pub tick_interval: Duration,
    /// How often topmost is re-applied while visible
    pub topmost_interval: Duration,
    /// Clamp scale changes to [scale::MIN, scale::MAX]
    pub scale_limits: bool,
    /// Straight-alpha RGBA fill behind the image
    pub background: [u8; 4],
    /// Memory allowed for composed frames
    pub cache_budget: usize,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(timing::TICK_INTERVAL_MS),
            topmost_interval: Duration::from_millis(timing::TOPMOST_INTERVAL_MS),
            scale_limits: true,
            background: [0, 0, 0, 0],
            cache_budget: FRAME_CACHE_BUDGET_BYTES,
        }
    }
}

/// When the event loop should wake the controller next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wakeup {
    pub at: Instant,
    /// Set when the wakeup is (also) for the animation timer
    pub animation: Option<TimerToken>,
}

pub struct OverlayController<S: PlatformOverlaySurface> {
    surface: S,
    state: OverlayState,
    display: ScreenRect,
    options: ControllerOptions,
    clock: AnimationClock,
    timer: AnimationTimer,
    cache: FrameCache,
    drag_offset: (i32, i32),
    last_layout: Option<Layout>,
    next_topmost: Option<Instant>,
    /// Scale and image size when a right-drag resize started
    resize_origin: Option<(f32, ScreenRect)>,
}

impl<S: PlatformOverlaySurface> OverlayController<S> {
    /// Take ownership of `surface` and style it as an overlay.
    /// Fails with WindowInit if the surface can't be set up.
    pub fn new(mut surface: S, display: ScreenRect, mut options: ControllerOptions) -> Result<Self> {
        surface.initialize()?;
        surface.hide();

        let tick = options
            .tick_interval
            .max(Duration::from_millis(timing::MIN_TICK_INTERVAL_MS));
        options.topmost_interval = options
            .topmost_interval
            .max(Duration::from_millis(timing::MIN_TOPMOST_INTERVAL_MS));

        info!(
            "Overlay controller ready on display {:?} (tick {:?}, topmost every {:?})",
            display, tick, options.topmost_interval
        );

        Ok(Self {
            surface,
            state: OverlayState::default(),
            display,
            cache: FrameCache::new(options.cache_budget),
            options,
            clock: AnimationClock::new(),
            timer: AnimationTimer::new(tick),
            drag_offset: (0, 0),
            last_layout: None,
            next_topmost: None,
            resize_origin: None,
        })
    }

    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    pub fn phase(&self) -> OverlayPhase {
        self.state.phase()
    }

    pub fn is_visible(&self) -> bool {
        self.state.visible
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn display(&self) -> ScreenRect {
        self.display
    }

    pub fn last_error(&self) -> Option<&str> {
        self.state.last_error.as_deref()
    }

    pub fn take_last_error(&mut self) -> Option<String> {
        self.state.last_error.take()
    }

    pub fn is_animation_running(&self) -> bool {
        self.timer.is_running()
    }

    /// Decode `path` and make it the active image.
    ///
    /// Decoding happens here, synchronously, never on the tick path. On
    /// failure the previous image stays active and the error is recorded.
    pub fn set_active_image(&mut self, path: impl AsRef<Path>, opacity: f32) -> Result<()> {
        match OverlayImage::load(path.as_ref(), opacity) {
            Ok(image) => {
                self.install_image(image);
                Ok(())
            }
            Err(e) => {
                warn!("{}", e);
                self.state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Make an already decoded image the active one
    pub fn install_image(&mut self, image: OverlayImage) {
        info!(
            "Active image: {} ({} frame(s))",
            image.source_path().display(),
            image.frame_count()
        );

        self.state.opacity = image.opacity();
        self.state.active_image = Some(image);
        self.state.current_frame_index = 0;
        self.state.last_error = None;
        self.clock.reset();
        self.cache.clear();

        self.restart_timer();
        self.render();
    }

    /// Set the whole-window opacity, clamped to [0, 1]
    pub fn set_opacity(&mut self, value: f32) {
        let opacity = clamp_unit(value);
        self.state.opacity = opacity;
        if let Some(image) = self.state.active_image.as_mut() {
            image.set_opacity(opacity);
        }
        self.surface.set_alpha(opacity_to_alpha(opacity));
        debug!("Opacity set to {:.2}", opacity);
    }

    /// Flip visibility; returns the new visibility
    pub fn toggle_overlay(&mut self) -> bool {
        let visible = !self.state.visible;
        self.set_visible(visible);
        visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        if self.state.visible == visible {
            return;
        }
        self.state.visible = visible;

        if visible {
            if self.state.active_image.is_none() {
                info!("Overlay shown without an image");
            }
            // Upload the current frame before mapping so nothing stale flashes
            self.render();
            self.surface.show();
            self.reassert_topmost(Instant::now());
            self.restart_timer();
            info!("Overlay shown");
        } else {
            self.timer.cancel();
            self.next_topmost = None;
            self.surface.hide();
            info!("Overlay hidden");
        }
    }

    /// Advance the animation by `elapsed` of wall time.
    /// Returns true if the frame changed and was repainted.
    pub fn tick(&mut self, elapsed: Duration) -> bool {
        if !self.state.visible {
            return false;
        }
        let Some(image) = self.state.active_image.as_ref() else {
            return false;
        };

        let moved = self.clock.advance(
            image.frames(),
            &mut self.state.current_frame_index,
            elapsed,
            self.state.animation_speed,
        );
        if moved {
            self.render();
        }
        moved
    }

    /// Earliest time the event loop needs to call on_wakeup()
    pub fn next_wakeup(&self) -> Option<Wakeup> {
        let animation = self.timer.scheduled();
        let topmost = self.next_topmost.filter(|_| self.state.visible);

        let at = match (animation.map(|(_, at)| at), topmost) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => return None,
        };

        Some(Wakeup {
            at,
            animation: animation.map(|(token, _)| token),
        })
    }

    /// Handle a wakeup scheduled from next_wakeup(). Stale animation tokens
    /// (timer cancelled or restarted since) are ignored.
    pub fn on_wakeup(&mut self, wakeup: Wakeup, now: Instant) {
        if let Some(token) = wakeup.animation {
            if let Some(elapsed) = self.timer.fire(token, now) {
                self.tick(elapsed);
            }
        }

        if self.state.visible && self.next_topmost.is_some_and(|t| now >= t) {
            self.reassert_topmost(now);
        }
    }

    /// Put the window back on top; other topmost windows can contest it
    pub fn reassert_topmost(&mut self, now: Instant) {
        if !self.state.visible {
            return;
        }
        self.surface.reassert_topmost();
        self.next_topmost = Some(now + self.options.topmost_interval);
    }

    pub fn set_scaling_mode(&mut self, mode: ScalingMode) {
        if self.state.scaling_mode == mode {
            return;
        }
        self.state.scaling_mode = mode;
        info!("Scaling mode: {}", mode.label());
        self.render();
    }

    /// Set the scale used by the current mode (tile scale in tile mode)
    pub fn set_scale_factor(&mut self, value: f32) -> f32 {
        let value = self.limit_scale(value);
        if self.state.scaling_mode == ScalingMode::Tile {
            self.state.tile_scale = value;
        } else {
            self.state.scale_factor = value;
        }
        self.render();
        value
    }

    /// Restore both scales at once, e.g. from saved settings
    pub fn set_scales(&mut self, scale_factor: f32, tile_scale: f32) {
        self.state.scale_factor = self.limit_scale(scale_factor);
        self.state.tile_scale = self.limit_scale(tile_scale);
        self.render();
    }

    pub fn increase_scale(&mut self) -> f32 {
        self.set_scale_factor(self.current_scale() + scale::STEP)
    }

    pub fn decrease_scale(&mut self) -> f32 {
        self.set_scale_factor(self.current_scale() - scale::STEP)
    }

    fn current_scale(&self) -> f32 {
        if self.state.scaling_mode == ScalingMode::Tile {
            self.state.tile_scale
        } else {
            self.state.scale_factor
        }
    }

    fn limit_scale(&self, value: f32) -> f32 {
        let value = if value.is_finite() { value } else { 1.0 };
        // Round away float drift from repeated steps
        let value = (value * 100.0).round() / 100.0;
        if self.options.scale_limits {
            value.clamp(scale::MIN, scale::MAX)
        } else {
            value.clamp(scale::FLOOR, scale::CEILING)
        }
    }

    pub fn set_scale_limits(&mut self, enabled: bool) {
        self.options.scale_limits = enabled;
    }

    /// Playback speed in percent of native speed
    pub fn set_animation_speed(&mut self, percent: u32) {
        self.state.animation_speed = percent.clamp(speed::MIN, speed::MAX);
    }

    /// Straight-alpha RGBA fill behind the image
    pub fn set_background(&mut self, rgba: [u8; 4]) {
        self.options.background = rgba;
        self.render();
    }

    /// Edit mode lets the overlay receive the mouse so it can be dragged
    pub fn set_edit_mode(&mut self, edit_mode: bool) {
        if self.state.edit_mode == edit_mode {
            return;
        }
        self.state.edit_mode = edit_mode;
        self.resize_origin = None;
        self.surface.set_click_through(!edit_mode);
        info!("Edit mode {}", if edit_mode { "on" } else { "off" });
    }

    /// The OS moved the window (a drag in edit mode); keep it there
    pub fn window_moved(&mut self, x: i32, y: i32) {
        if !self.state.edit_mode {
            return;
        }
        let Some(layout) = self.last_layout else {
            return;
        };
        let (dx, dy) = (x - layout.window.x, y - layout.window.y);
        if dx == 0 && dy == 0 {
            return;
        }
        self.drag_offset.0 += dx;
        self.drag_offset.1 += dy;
        self.last_layout = Some(Layout {
            window: layout.window.offset(dx, dy),
            ..layout
        });
        self.cache.clear();
        debug!("Overlay dragged to offset {:?}", self.drag_offset);
    }

    /// Start a right-drag resize; only possible in edit mode once the
    /// image has been laid out
    pub fn begin_resize(&mut self) -> bool {
        self.resize_origin = self
            .last_layout
            .filter(|_| self.state.edit_mode)
            .map(|layout| (self.current_scale(), layout.image));
        self.resize_origin.is_some()
    }

    /// Resize for a drag of (dx, dy) pixels since begin_resize(). The
    /// aspect ratio is kept, following whichever axis moved relatively
    /// more. Returns the resulting scale.
    pub fn resize_drag(&mut self, dx: i32, dy: i32) -> f32 {
        let Some((origin_scale, image)) = self.resize_origin else {
            return self.current_scale();
        };
        let ratio = |size: u32, delta: i32| {
            let size = size.max(1) as f32;
            let floor = size.min(scale::MIN_DRAG_EXTENT as f32);
            (size + delta as f32).max(floor) / size
        };
        let (rx, ry) = (ratio(image.width, dx), ratio(image.height, dy));
        let ratio = if (rx - 1.0).abs() >= (ry - 1.0).abs() { rx } else { ry };
        self.set_scale_factor(origin_scale * ratio)
    }

    pub fn end_resize(&mut self) {
        self.resize_origin = None;
    }

    /// Drop any drag offset and re-center the image
    pub fn reset_position(&mut self) {
        self.drag_offset = (0, 0);
        self.render();
    }

    /// Move the overlay to another display (monitor change)
    pub fn set_display(&mut self, display: ScreenRect) {
        if self.display == display {
            return;
        }
        info!("Overlay display changed to {:?}", display);
        self.display = display;
        self.drag_offset = (0, 0);
        self.cache.clear();
        self.render();
    }

    fn restart_timer(&mut self) {
        if self.state.visible && self.state.is_animated() {
            self.clock.reset();
            self.timer.start(Instant::now());
            debug!("Animation timer started");
        } else if self.timer.is_running() {
            self.timer.cancel();
            debug!("Animation timer stopped");
        }
    }

    fn layout_params(&self) -> LayoutParams {
        LayoutParams {
            mode: self.state.scaling_mode,
            scale_factor: self.state.scale_factor,
            tile_scale: self.state.tile_scale,
            background: premultiplied_bgra(self.options.background),
            drag_offset: self.drag_offset,
        }
    }

    /// Compose the current frame and hand it to the surface
    fn render(&mut self) {
        if !self.state.visible {
            return;
        }
        let Some(image) = self.state.active_image.as_ref() else {
            return;
        };

        let params = self.layout_params();
        let layout = Layout::compute(self.display, image.width(), image.height(), &params);
        self.last_layout = Some(layout);
        self.surface.set_bounds(layout.window);

        let alpha = opacity_to_alpha(self.state.opacity);
        let index = self.state.current_frame_index;
        if let Some(canvas) = self.cache.get(image.frames(), index, &layout, params.background) {
            self.surface.present(canvas, alpha);
        }
    }
}

fn premultiplied_bgra([r, g, b, a]: [u8; 4]) -> [u8; 4] {
    let premul = |c: u8| ((u16::from(c) * u16::from(a) + 127) / 255) as u8;
    [premul(b), premul(g), premul(r), a]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::tests::{write_animated_webp, write_apng, write_gif, write_still};
    use crate::media::Frame;
    use crate::platform::testing::{RecordingSurface, SurfaceCall};
    use image::{ImageFormat, Rgba, RgbaImage};

    fn display() -> ScreenRect {
        ScreenRect::new(0, 0, 800, 600)
    }

    fn controller() -> OverlayController<RecordingSurface> {
        OverlayController::new(RecordingSurface::default(), display(), ControllerOptions::default())
            .unwrap()
    }

    fn animated(durations_ms: &[u64]) -> OverlayImage {
        let frames = durations_ms
            .iter()
            .map(|&ms| {
                Frame::from_rgba(
                    RgbaImage::from_pixel(40, 30, Rgba([255, 0, 0, 255])),
                    Some(Duration::from_millis(ms)),
                )
            })
            .collect();
        OverlayImage::from_frames("anim.gif", frames, 1.0).unwrap()
    }

    fn still() -> OverlayImage {
        let frame = Frame::from_rgba(RgbaImage::from_pixel(40, 30, Rgba([0, 0, 255, 255])), None);
        OverlayImage::from_frames("still.png", vec![frame], 1.0).unwrap()
    }

    fn ticks(c: &mut OverlayController<RecordingSurface>, total_ms: u64) {
        for _ in 0..total_ms / 10 {
            c.tick(Duration::from_millis(10));
        }
    }

    #[test]
    fn starts_hidden_without_image() {
        let c = controller();
        assert_eq!(c.phase(), OverlayPhase::Hidden);
        assert!(c.state().active_image.is_none());
        assert_eq!(c.surface().calls[0], SurfaceCall::Initialize);
    }

    #[test]
    fn window_init_failure_is_fatal() {
        let result = OverlayController::new(
            RecordingSurface::failing(),
            display(),
            ControllerOptions::default(),
        );
        assert!(matches!(result, Err(crate::error::OverlayError::WindowInit(_))));
    }

    #[test]
    fn toggle_twice_restores_visibility() {
        let mut c = controller();
        c.install_image(still());
        assert!(c.toggle_overlay());
        assert!(!c.toggle_overlay());
        assert_eq!(c.phase(), OverlayPhase::Hidden);
    }

    #[test]
    fn showing_reasserts_topmost_and_hiding_only_unmaps() {
        let mut c = controller();
        c.install_image(still());
        c.toggle_overlay();

        let calls = &c.surface().calls;
        let show = calls.iter().position(|x| *x == SurfaceCall::Show).unwrap();
        assert_eq!(calls[show + 1], SurfaceCall::ReassertTopmost);

        c.toggle_overlay();
        assert_eq!(c.surface().calls.last(), Some(&SurfaceCall::Hide));
        // Showing again reuses the same surface
        c.toggle_overlay();
        assert_eq!(c.surface().count(|x| *x == SurfaceCall::Initialize), 1);
    }

    #[test]
    fn phase_follows_frame_count_while_visible() {
        let mut c = controller();
        c.toggle_overlay();
        assert_eq!(c.phase(), OverlayPhase::VisibleStatic);

        c.install_image(animated(&[100, 100]));
        assert_eq!(c.phase(), OverlayPhase::VisibleAnimating);
        assert!(c.is_animation_running());

        c.install_image(still());
        assert_eq!(c.phase(), OverlayPhase::VisibleStatic);
        assert!(!c.is_animation_running());
    }

    #[test]
    fn loading_while_hidden_stays_hidden() {
        let mut c = controller();
        c.install_image(animated(&[100, 100]));
        assert_eq!(c.phase(), OverlayPhase::Hidden);
        assert!(!c.is_animation_running());

        c.toggle_overlay();
        assert_eq!(c.phase(), OverlayPhase::VisibleAnimating);
        assert!(c.is_animation_running());

        c.toggle_overlay();
        assert!(!c.is_animation_running());
    }

    #[test]
    fn every_supported_format_loads_into_a_visible_phase() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = controller();
        c.toggle_overlay();

        for (name, format) in [
            ("s.png", ImageFormat::Png),
            ("s.jpg", ImageFormat::Jpeg),
            ("s.bmp", ImageFormat::Bmp),
            ("s.webp", ImageFormat::WebP),
        ] {
            let path = dir.path().join(name);
            write_still(&path, format);
            c.set_active_image(&path, 1.0).unwrap();
            let image = c.state().active_image.as_ref().unwrap();
            assert!(!image.frames().is_empty());
            assert_eq!(c.phase(), OverlayPhase::VisibleStatic, "{name}");
        }

        let gif = dir.path().join("a.gif");
        write_gif(&gif, &[50, 50, 50]);
        c.set_active_image(&gif, 1.0).unwrap();
        assert_eq!(c.state().active_image.as_ref().unwrap().frame_count(), 3);
        assert_eq!(c.phase(), OverlayPhase::VisibleAnimating);
    }

    #[test]
    fn animated_webp_and_apng_play_through_the_controller() {
        let dir = tempfile::tempdir().unwrap();
        let webp = dir.path().join("a.webp");
        write_animated_webp(&webp, &[30, 30]);
        let apng = dir.path().join("a.png");
        write_apng(&apng, &[30, 30, 30]);

        let mut c = controller();
        c.toggle_overlay();
        for (path, frames) in [(&webp, 2), (&apng, 3)] {
            c.set_active_image(path, 1.0).unwrap();
            assert_eq!(c.phase(), OverlayPhase::VisibleAnimating);
            assert!(c.is_animation_running());

            ticks(&mut c, 30 * frames);
            assert_eq!(c.state().current_frame_index, 0, "{}", path.display());
            ticks(&mut c, 30);
            assert_eq!(c.state().current_frame_index, 1, "{}", path.display());
        }
    }

    #[test]
    fn corrupt_file_keeps_previous_image() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.png");
        write_still(&good, ImageFormat::Png);
        let bad = dir.path().join("bad.gif");
        std::fs::write(&bad, b"GIF89a garbage").unwrap();

        let mut c = controller();
        c.set_active_image(&good, 0.8).unwrap();

        let err = c.set_active_image(&bad, 1.0).unwrap_err();
        assert!(matches!(err, crate::error::OverlayError::Load { .. }));
        let active = c.state().active_image.as_ref().unwrap();
        assert_eq!(active.source_path(), good.as_path());
        assert_eq!(c.state().opacity, 0.8);
        assert!(c.last_error().unwrap().contains("bad.gif"));
    }

    #[test]
    fn successful_load_clears_last_error() {
        let mut c = controller();
        assert!(c.set_active_image("/missing/file.png", 1.0).is_err());
        assert!(c.last_error().is_some());
        c.install_image(still());
        assert!(c.last_error().is_none());
    }

    #[test]
    fn opacity_clamps_and_is_idempotent() {
        let mut c = controller();
        c.set_opacity(-0.5);
        assert_eq!(c.state().opacity, 0.0);
        c.set_opacity(1.5);
        assert_eq!(c.state().opacity, 1.0);

        c.set_opacity(0.4);
        c.set_opacity(0.4);
        assert_eq!(c.state().opacity, 0.4);
        assert_eq!(c.surface().calls.last(), Some(&SurfaceCall::Alpha(102)));
    }

    #[test]
    fn opacity_applies_to_presented_frames() {
        let mut c = controller();
        c.install_image(still());
        c.set_opacity(0.5);
        c.toggle_overlay();
        match c.surface().last_present() {
            Some(SurfaceCall::Present { alpha, .. }) => assert_eq!(*alpha, 128),
            other => panic!("expected a present, got {other:?}"),
        }
    }

    #[test]
    fn three_frame_animation_scenario() {
        let mut c = controller();
        c.toggle_overlay();
        c.install_image(animated(&[100, 100, 100]));

        ticks(&mut c, 250);
        assert_eq!(c.state().current_frame_index, 2);
        ticks(&mut c, 100);
        assert_eq!(c.state().current_frame_index, 0);
    }

    #[test]
    fn n_advances_wrap_to_zero() {
        let mut c = controller();
        c.toggle_overlay();
        c.install_image(animated(&[20, 30, 40, 50, 60]));

        let mut advances = 0;
        while advances < 5 {
            if c.tick(Duration::from_millis(10)) {
                advances += 1;
            }
        }
        assert_eq!(c.state().current_frame_index, 0);
    }

    #[test]
    fn tick_is_noop_for_static_or_hidden() {
        let mut c = controller();
        c.install_image(animated(&[10, 10]));
        assert!(!c.tick(Duration::from_millis(50)));
        assert_eq!(c.state().current_frame_index, 0);

        c.toggle_overlay();
        c.install_image(still());
        assert!(!c.tick(Duration::from_secs(1)));
    }

    #[test]
    fn new_image_resets_frame_index() {
        let mut c = controller();
        c.toggle_overlay();
        c.install_image(animated(&[100, 100, 100]));
        ticks(&mut c, 150);
        assert_eq!(c.state().current_frame_index, 1);

        c.install_image(animated(&[100, 100]));
        assert_eq!(c.state().current_frame_index, 0);
    }

    #[test]
    fn stale_wakeup_is_ignored_after_image_change() {
        let mut c = controller();
        c.toggle_overlay();
        c.install_image(animated(&[10, 10]));
        let stale = c.next_wakeup().unwrap();

        c.install_image(animated(&[10, 10, 10]));
        c.on_wakeup(stale, stale.at + Duration::from_secs(1));
        assert_eq!(c.state().current_frame_index, 0);

        let fresh = c.next_wakeup().unwrap();
        assert_ne!(fresh.animation, stale.animation);
        c.on_wakeup(fresh, fresh.at + Duration::from_millis(15));
        assert_ne!(c.state().current_frame_index, 0);
    }

    #[test]
    fn hidden_overlay_has_no_wakeups() {
        let mut c = controller();
        c.install_image(animated(&[10, 10]));
        assert_eq!(c.next_wakeup(), None);
        c.toggle_overlay();
        assert!(c.next_wakeup().is_some());
        c.toggle_overlay();
        assert_eq!(c.next_wakeup(), None);
    }

    #[test]
    fn topmost_is_reasserted_periodically() {
        let options = ControllerOptions {
            topmost_interval: Duration::from_millis(200),
            ..Default::default()
        };
        let mut c = OverlayController::new(RecordingSurface::default(), display(), options).unwrap();
        c.install_image(still());
        c.toggle_overlay();
        let before = c.surface().count(|x| *x == SurfaceCall::ReassertTopmost);

        let wakeup = c.next_wakeup().unwrap();
        assert_eq!(wakeup.animation, None);
        c.on_wakeup(wakeup, wakeup.at);
        assert_eq!(
            c.surface().count(|x| *x == SurfaceCall::ReassertTopmost),
            before + 1
        );
        assert!(c.next_wakeup().unwrap().at > wakeup.at);
    }

    #[test]
    fn scale_steps_respect_limits() {
        let mut c = controller();
        c.set_scale_factor(9.95);
        assert_eq!(c.increase_scale(), 10.0);
        assert_eq!(c.increase_scale(), 10.0);

        c.set_scale_factor(0.15);
        assert_eq!(c.decrease_scale(), 0.1);

        c.set_scale_limits(false);
        assert_eq!(c.set_scale_factor(25.0), 25.0);
        assert_eq!(c.set_scale_factor(-3.0), scale::FLOOR);
        assert_eq!(c.set_scale_factor(100_000.0), scale::CEILING);
    }

    #[test]
    fn unlimited_scale_still_presents_a_display_sized_frame() {
        let mut c = controller();
        c.set_background([0, 0, 0, 255]);
        c.set_scaling_mode(ScalingMode::Stretch);
        c.install_image(still());
        c.toggle_overlay();

        c.set_scale_limits(false);
        c.set_scale_factor(100_000.0);
        c.increase_scale();
        assert_eq!(c.surface().bounds, display());
        match c.surface().last_present() {
            Some(SurfaceCall::Present { width, height, .. }) => {
                assert_eq!((*width, *height), (800, 600))
            }
            other => panic!("expected a present, got {other:?}"),
        }
    }

    #[test]
    fn zero_topmost_interval_does_not_spin() {
        let options = ControllerOptions {
            topmost_interval: Duration::ZERO,
            ..Default::default()
        };
        let mut c = OverlayController::new(RecordingSurface::default(), display(), options).unwrap();
        c.install_image(still());
        c.toggle_overlay();

        let first = c.next_wakeup().unwrap();
        c.on_wakeup(first, first.at);
        let next = c.next_wakeup().unwrap();
        assert!(next.at >= first.at + Duration::from_millis(timing::MIN_TOPMOST_INTERVAL_MS));
    }

    #[test]
    fn restored_scales_are_limited() {
        let mut c = controller();
        c.set_scales(50.0, 0.5);
        assert_eq!(c.state().scale_factor, scale::MAX);
        assert_eq!(c.state().tile_scale, 0.5);
    }

    #[test]
    fn tile_mode_scales_tiles_not_image() {
        let mut c = controller();
        c.set_scaling_mode(ScalingMode::Tile);
        c.increase_scale();
        assert_eq!(c.state().tile_scale, 1.1);
        assert_eq!(c.state().scale_factor, 1.0);
    }

    #[test]
    fn fit_mode_sizes_window_to_image_aspect() {
        let mut c = controller();
        c.install_image(still());
        c.toggle_overlay();
        // 40x30 fitted into 800x600 is exactly the display
        assert_eq!(c.surface().bounds, ScreenRect::new(0, 0, 800, 600));

        c.set_scaling_mode(ScalingMode::Center);
        assert_eq!(c.surface().bounds, ScreenRect::new(380, 285, 40, 30));
    }

    #[test]
    fn edit_mode_toggles_click_through() {
        let mut c = controller();
        c.set_edit_mode(true);
        assert_eq!(c.surface().calls.last(), Some(&SurfaceCall::ClickThrough(false)));
        c.set_edit_mode(false);
        assert_eq!(c.surface().calls.last(), Some(&SurfaceCall::ClickThrough(true)));
    }

    #[test]
    fn drag_in_edit_mode_sticks() {
        let mut c = controller();
        c.set_scaling_mode(ScalingMode::Center);
        c.install_image(still());
        c.toggle_overlay();
        c.set_edit_mode(true);

        c.window_moved(400, 300);
        c.set_opacity(0.9);
        c.tick(Duration::from_millis(10));
        c.set_scaling_mode(ScalingMode::Center);
        c.reset_position();
        assert_eq!(c.surface().bounds, ScreenRect::new(380, 285, 40, 30));

        c.window_moved(100, 50);
        c.set_background([0, 0, 0, 0]);
        assert_eq!(c.surface().bounds, ScreenRect::new(100, 50, 40, 30));
    }

    #[test]
    fn right_drag_resize_scales_from_the_drag_origin() {
        let mut c = controller();
        c.set_scaling_mode(ScalingMode::Center);
        c.install_image(still());
        c.toggle_overlay();
        assert!(!c.begin_resize());

        c.set_edit_mode(true);
        assert!(c.begin_resize());
        assert_eq!(c.resize_drag(40, 0), 2.0);
        assert_eq!(c.surface().bounds, ScreenRect::new(360, 270, 80, 60));
        // Offsets are from the origin, not cumulative
        assert_eq!(c.resize_drag(20, 5), 1.5);
        // A 40x30 image is already below the minimum, so it can't shrink
        assert_eq!(c.resize_drag(-100, -100), 1.0);

        c.set_edit_mode(false);
        assert_eq!(c.resize_drag(400, 0), 1.0);
    }

    #[test]
    fn display_change_moves_window() {
        let mut c = controller();
        c.install_image(still());
        c.toggle_overlay();
        c.set_display(ScreenRect::new(1920, 0, 1280, 720));
        assert_eq!(c.surface().bounds.x, 1920 + (1280 - 960) / 2);
    }

    #[test]
    fn background_is_premultiplied() {
        assert_eq!(premultiplied_bgra([255, 0, 0, 128]), [0, 0, 128, 128]);
        assert_eq!(premultiplied_bgra([10, 20, 30, 0]), [0, 0, 0, 0]);
    }
}
