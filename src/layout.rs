// layout.rs - Overlay Placement and Frame Composition
//
// Works out where the overlay window goes on a display and how the image is
// placed inside it, then composes a frame into the window-sized canvas that
// the platform surface presents. Everything here is premultiplied BGRA.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use log::trace;
use serde::{Deserialize, Serialize};

use crate::constants::scale::MAX_EXTENT;
use crate::media::Frame;

/// Represents a rectangular region on the screen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScreenRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ScreenRect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }
}

/// How the image is fitted to the display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalingMode {
    /// Keep aspect ratio, as large as fits
    #[default]
    Fit,
    /// Fill the display, ignoring aspect ratio
    Stretch,
    /// Native size, centered
    Center,
    /// Repeat the image across the display
    Tile,
}

impl ScalingMode {
    pub fn all() -> &'static [ScalingMode] {
        &[Self::Fit, Self::Stretch, Self::Center, Self::Tile]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Fit => "Fit",
            Self::Stretch => "Stretch",
            Self::Center => "Center",
            Self::Tile => "Tile",
        }
    }
}

/// Inputs that decide the layout besides the image and display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
    pub mode: ScalingMode,
    pub scale_factor: f32,
    pub tile_scale: f32,
    /// Premultiplied BGRA fill behind the image
    pub background: [u8; 4],
    /// User offset from dragging the window in edit mode
    pub drag_offset: (i32, i32),
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            mode: ScalingMode::Fit,
            scale_factor: 1.0,
            tile_scale: 1.0,
            background: [0, 0, 0, 0],
            drag_offset: (0, 0),
        }
    }
}

/// Where the window goes and where the image sits inside it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Window bounds in screen coordinates
    pub window: ScreenRect,
    /// Image rectangle relative to the window (may extend past its edges)
    pub image: ScreenRect,
    /// The image repeats across the window
    pub tiled: bool,
}

impl Layout {
    /// Compute the layout of an `image_w`x`image_h` image on `display`.
    ///
    /// With a transparent background the window shrinks to the visible part
    /// of the image so the rest of the display is untouched; a visible
    /// background or tiling covers the whole display.
    pub fn compute(display: ScreenRect, image_w: u32, image_h: u32, params: &LayoutParams) -> Self {
        let (dw, dh) = (display.width.max(1), display.height.max(1));
        let (iw, ih) = (image_w.max(1), image_h.max(1));

        if params.mode == ScalingMode::Tile {
            let (tw, th) = scaled(iw, ih, params.tile_scale);
            return Self {
                window: display,
                image: ScreenRect::new(0, 0, tw, th),
                tiled: true,
            };
        }

        let (w, h) = match params.mode {
            ScalingMode::Fit => {
                let fit = (dw as f32 / iw as f32).min(dh as f32 / ih as f32);
                scaled(iw, ih, fit * params.scale_factor)
            }
            ScalingMode::Stretch => scaled(dw, dh, params.scale_factor),
            ScalingMode::Center | ScalingMode::Tile => scaled(iw, ih, params.scale_factor),
        };

        let (dx, dy) = params.drag_offset;
        let x = (dw as i64 - w as i64) / 2 + dx as i64;
        let y = (dh as i64 - h as i64) / 2 + dy as i64;

        if params.background[3] > 0 {
            return Self {
                window: display,
                image: ScreenRect::new(x as i32, y as i32, w, h),
                tiled: false,
            };
        }

        // Clip the window to the display, keep the image offset inside it
        let left = x.max(0);
        let top = y.max(0);
        let right = (x + w as i64).min(dw as i64);
        let bottom = (y + h as i64).min(dh as i64);
        if right <= left || bottom <= top {
            // Dragged fully off the display; keep a 1px window so z-order
            // and visibility bookkeeping still work
            return Self {
                window: ScreenRect::new(display.x, display.y, 1, 1),
                image: ScreenRect::new(0, 0, 0, 0),
                tiled: false,
            };
        }

        Self {
            window: ScreenRect::new(
                display.x + left as i32,
                display.y + top as i32,
                (right - left) as u32,
                (bottom - top) as u32,
            ),
            image: ScreenRect::new((x - left) as i32, (y - top) as i32, w, h),
            tiled: false,
        }
    }
}

/// Scale `w`x`h` by `factor`, keeping both sides within MAX_EXTENT
fn scaled(w: u32, h: u32, factor: f32) -> (u32, u32) {
    let f = if factor.is_finite() && factor > 0.0 { factor } else { 1.0 };
    let f = f.min(MAX_EXTENT as f32 / w.max(h).max(1) as f32);
    (
        ((w as f32 * f).round() as u32).clamp(1, MAX_EXTENT),
        ((h as f32 * f).round() as u32).clamp(1, MAX_EXTENT),
    )
}

/// Compose one frame into a canvas the size of `layout.window`.
///
/// A scaled image no larger than the window is resampled whole. Anything
/// bigger is only resampled where it lands in the window, so the work and
/// memory stay bounded by the window size at any scale.
pub fn compose(frame: &Frame, layout: &Layout, background: [u8; 4]) -> RgbaImage {
    let (cw, ch) = (layout.window.width, layout.window.height);
    let mut canvas = RgbaImage::from_pixel(cw, ch, Rgba(background));

    let target = layout.image;
    if target.width == 0 || target.height == 0 {
        return canvas;
    }

    let src = frame.pixels();
    let full = (target.width, target.height);
    let fits = u64::from(full.0) * u64::from(full.1) <= u64::from(cw) * u64::from(ch);

    let resized;
    let whole: Option<&RgbaImage> = if full == src.dimensions() {
        Some(src)
    } else if fits {
        // Resampling premultiplied data avoids dark fringes around edges
        resized = imageops::resize(src, full.0, full.1, FilterType::Triangle);
        Some(&resized)
    } else {
        None
    };

    if layout.tiled {
        // Whatever shows of any tile lies in the first tile's top-left corner
        let corner = ScreenRect::new(0, 0, full.0.min(cw), full.1.min(ch));
        let part;
        let tile = match whole {
            Some(tile) => tile,
            None => {
                part = scaled_region(src, full, corner);
                &part
            }
        };
        for ty in (0..ch).step_by(full.1 as usize) {
            for tx in (0..cw).step_by(full.0 as usize) {
                blend_over(&mut canvas, tile, tx as i64, ty as i64);
            }
        }
    } else if let Some(whole) = whole {
        blend_over(&mut canvas, whole, target.x as i64, target.y as i64);
    } else if let Some(visible) = visible_part(&target, cw, ch) {
        let part = scaled_region(src, full, visible);
        blend_over(
            &mut canvas,
            &part,
            target.x as i64 + visible.x as i64,
            target.y as i64 + visible.y as i64,
        );
    }

    trace!("Composed {}x{} canvas", cw, ch);
    canvas
}

/// The part of `image` inside a `cw`x`ch` window, relative to the image
fn visible_part(image: &ScreenRect, cw: u32, ch: u32) -> Option<ScreenRect> {
    let (x, y) = (i64::from(image.x), i64::from(image.y));
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + i64::from(image.width)).min(i64::from(cw));
    let y1 = (y + i64::from(image.height)).min(i64::from(ch));
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(ScreenRect::new(
        (x0 - x) as i32,
        (y0 - y) as i32,
        (x1 - x0) as u32,
        (y1 - y0) as u32,
    ))
}

/// Resample the `region` of `src` as if it were scaled to `full`, without
/// building the full scaled image. `region` is in scaled coordinates.
fn scaled_region(src: &RgbaImage, full: (u32, u32), region: ScreenRect) -> RgbaImage {
    let (fw, fh) = (u64::from(full.0), u64::from(full.1));
    let (sw, sh) = (u64::from(src.width()), u64::from(src.height()));
    let (rx, ry) = (region.x.max(0) as u64, region.y.max(0) as u64);
    let (rw, rh) = (u64::from(region.width), u64::from(region.height));

    if fw <= sw && fh <= sh {
        // Shrinking: cut out the source pixels under the region first
        let x0 = (rx * sw / fw).min(sw - 1);
        let y0 = (ry * sh / fh).min(sh - 1);
        let x1 = ((rx + rw) * sw).div_ceil(fw).clamp(x0 + 1, sw);
        let y1 = ((ry + rh) * sh).div_ceil(fh).clamp(y0 + 1, sh);
        let crop = imageops::crop_imm(src, x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32);
        return imageops::resize(&*crop, region.width, region.height, FilterType::Triangle);
    }

    // Enlarging: sample every visible pixel straight from the source
    RgbaImage::from_fn(region.width, region.height, |x, y| {
        let u = ((rx + u64::from(x)) as f32 + 0.5) / fw as f32;
        let v = ((ry + u64::from(y)) as f32 + 0.5) / fh as f32;
        imageops::sample_bilinear(src, u.min(1.0), v.min(1.0)).unwrap_or(Rgba([0; 4]))
    })
}

/// Premultiplied source-over blend of `src` at (x, y), clipped to `dst`
fn blend_over(dst: &mut RgbaImage, src: &RgbaImage, x: i64, y: i64) {
    let (dw, dh) = (dst.width() as i64, dst.height() as i64);
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + src.width() as i64).min(dw);
    let y1 = (y + src.height() as i64).min(dh);

    for py in y0..y1 {
        for px in x0..x1 {
            let s = src.get_pixel((px - x) as u32, (py - y) as u32).0;
            let d = dst.get_pixel_mut(px as u32, py as u32);
            if s[3] == 255 || d.0[3] == 0 {
                d.0 = s;
                continue;
            }
            let inv = 255 - u16::from(s[3]);
            for c in 0..4 {
                d.0[c] = s[c].saturating_add(((u16::from(d.0[c]) * inv + 127) / 255) as u8);
            }
        }
    }
}

/// Composed canvases for the active image, one slot per frame.
///
/// Slots are filled lazily; once the byte budget is spent further frames are
/// composed on demand every time they are shown.
#[derive(Debug)]
pub struct FrameCache {
    key: Option<(Layout, [u8; 4])>,
    slots: Vec<Option<RgbaImage>>,
    bytes: usize,
    budget: usize,
}

impl FrameCache {
    pub fn new(budget: usize) -> Self {
        Self {
            key: None,
            slots: Vec::new(),
            bytes: 0,
            budget,
        }
    }

    pub fn clear(&mut self) {
        self.key = None;
        self.slots.clear();
        self.bytes = 0;
    }

    pub fn cached_frames(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Get the canvas for `frames[index]`, composing it if needed
    pub fn get(
        &mut self,
        frames: &[Frame],
        index: usize,
        layout: &Layout,
        background: [u8; 4],
    ) -> Option<&RgbaImage> {
        let frame = frames.get(index)?;

        let key = (*layout, background);
        if self.key != Some(key) || self.slots.len() != frames.len() {
            self.clear();
            self.key = Some(key);
            self.slots.resize_with(frames.len(), || None);
        }

        if self.slots[index].is_none() {
            let canvas = compose(frame, layout, background);
            let size = canvas.as_raw().len();
            if self.bytes + size <= self.budget {
                self.bytes += size;
            } else {
                // Over budget: recycle the slot of some other frame
                if let Some(victim) = self
                    .slots
                    .iter_mut()
                    .enumerate()
                    .find(|(i, s)| *i != index && s.is_some())
                    .map(|(_, s)| s)
                {
                    if let Some(old) = victim.take() {
                        self.bytes -= old.as_raw().len();
                    }
                }
                self.bytes += size;
            }
            self.slots[index] = Some(canvas);
        }

        self.slots[index].as_ref()
    }
}
