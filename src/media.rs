// media.rs - Overlay Image Decoding
//
// Turns an image file into an OverlayImage: an ordered, non-empty list of
// frames with per-frame durations. Animated GIF, WEBP and APNG go through
// the image crate's AnimationDecoder; everything else is a single frame.
//
// Frames are stored as premultiplied BGRA, which is what a 32-bit DIB fed to
// UpdateLayeredWindow expects, so presenting a frame is a plain copy.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, ImageFormat, RgbaImage};
use log::{debug, info};

use crate::constants::timing::ZERO_DELAY_FALLBACK_MS;
use crate::error::{OverlayError, Result};
use crate::utils::clamp_unit;

/// One decoded frame
#[derive(Debug, Clone)]
pub struct Frame {
    /// Premultiplied BGRA pixels (the RGBA buffer type is only a container)
    pixels: RgbaImage,
    /// How long the frame stays on screen; None for static images
    duration: Option<Duration>,
}

impl Frame {
    /// Build a frame from straight-alpha RGBA pixels
    pub fn from_rgba(mut pixels: RgbaImage, duration: Option<Duration>) -> Self {
        rgba_to_premultiplied_bgra(&mut pixels);
        Self { pixels, duration }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// The image currently shown (or about to be shown) by the overlay
#[derive(Debug, Clone)]
pub struct OverlayImage {
    source_path: PathBuf,
    frames: Vec<Frame>,
    opacity: f32,
}

impl OverlayImage {
    /// Decode `path` synchronously. Opacity is clamped to [0, 1].
    pub fn load(path: impl AsRef<Path>, opacity: f32) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| OverlayError::load(path, e))?;

        let format = image::guess_format(&bytes)
            .or_else(|_| ImageFormat::from_path(path))
            .map_err(|e| OverlayError::load(path, e))?;

        let frames = decode_frames(bytes, format).map_err(|e| OverlayError::load(path, e))?;
        let image = Self::from_frames(path, frames, opacity)?;

        info!(
            "Loaded {:?} {}x{} with {} frame(s) from {}",
            format,
            image.width(),
            image.height(),
            image.frame_count(),
            path.display()
        );
        Ok(image)
    }

    /// Assemble an image from already decoded frames
    pub fn from_frames(path: impl Into<PathBuf>, frames: Vec<Frame>, opacity: f32) -> Result<Self> {
        let source_path = path.into();
        let Some(first) = frames.first() else {
            return Err(OverlayError::load(source_path, "image contains no frames"));
        };
        if first.width() == 0 || first.height() == 0 {
            return Err(OverlayError::load(source_path, "image has zero size"));
        }

        Ok(Self {
            source_path,
            frames,
            opacity: clamp_unit(opacity),
        })
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }

    pub fn width(&self) -> u32 {
        self.frames[0].width()
    }

    pub fn height(&self) -> u32 {
        self.frames[0].height()
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub(crate) fn set_opacity(&mut self, opacity: f32) {
        self.opacity = clamp_unit(opacity);
    }
}

/// Decode every frame of an in-memory image
fn decode_frames(bytes: Vec<u8>, format: ImageFormat) -> image::ImageResult<Vec<Frame>> {
    match format {
        ImageFormat::Gif => {
            let decoder = GifDecoder::new(Cursor::new(bytes))?;
            collect_animation(decoder)
        }
        ImageFormat::WebP => {
            let decoder = WebPDecoder::new(Cursor::new(bytes.as_slice()))?;
            if decoder.has_animation() {
                collect_animation(decoder)
            } else {
                decode_static(&bytes, format)
            }
        }
        ImageFormat::Png => {
            let decoder = PngDecoder::new(Cursor::new(bytes.as_slice()))?;
            if decoder.is_apng()? {
                collect_animation(decoder.apng()?)
            } else {
                decode_static(&bytes, format)
            }
        }
        _ => decode_static(&bytes, format),
    }
}

fn decode_static(bytes: &[u8], format: ImageFormat) -> image::ImageResult<Vec<Frame>> {
    let image = image::load_from_memory_with_format(bytes, format)?;
    Ok(vec![Frame::from_rgba(image.to_rgba8(), None)])
}

fn collect_animation<'a>(decoder: impl AnimationDecoder<'a>) -> image::ImageResult<Vec<Frame>> {
    let mut frames = Vec::new();
    for frame in decoder.into_frames() {
        let frame = frame?;
        let duration = frame_delay(frame.delay());
        frames.push(Frame::from_rgba(frame.into_buffer(), Some(duration)));
    }

    // A one-frame "animation" is a still image
    if frames.len() == 1 {
        frames[0].duration = None;
    }

    debug!("Decoded animation with {} frame(s)", frames.len());
    Ok(frames)
}

/// Convert a decoder delay into a frame duration.
/// A zero delay is shown for the conventional 100 ms, like browsers do.
fn frame_delay(delay: image::Delay) -> Duration {
    let (numer, denom) = delay.numer_denom_ms();
    let ms = if denom == 0 { 0 } else { u64::from(numer) / u64::from(denom) };
    if ms == 0 {
        Duration::from_millis(ZERO_DELAY_FALLBACK_MS)
    } else {
        Duration::from_millis(ms)
    }
}

/// Straight RGBA to premultiplied BGRA, in place
fn rgba_to_premultiplied_bgra(pixels: &mut RgbaImage) {
    for px in pixels.pixels_mut() {
        let [r, g, b, a] = px.0;
        let premul = |c: u8| ((u16::from(c) * u16::from(a) + 127) / 255) as u8;
        px.0 = [premul(b), premul(g), premul(r), a];
    }
}
