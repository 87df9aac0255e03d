//! PeekOverlay - Image Overlay Library
//!
//! Core of the overlay: image decoding, layout, the animation clock and the
//! controller that drives a platform overlay surface. The binary adds the
//! event loop, tray and dialogs on top.

pub mod animation;
pub mod app;
pub mod constants;
pub mod error;
pub mod gallery;
pub mod hotkey;
pub mod layout;
pub mod media;
pub mod platform;
pub mod settings;
pub mod utils;

// Re-export commonly used types
pub use app::{ControllerOptions, OverlayController, OverlayPhase, OverlayState, Wakeup};
pub use error::{OverlayError, Result};
pub use hotkey::{HotkeyBinding, HotkeyService};
pub use layout::{ScalingMode, ScreenRect};
pub use media::{Frame, OverlayImage};
pub use platform::{NativeSurface, PlatformOverlaySurface};
pub use settings::Settings;
