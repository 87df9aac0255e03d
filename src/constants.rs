// constants.rs - Application-wide Constants
//
// Centralized constants for timings, limits and defaults.

/// Name used for the window title, tray tooltip and config directories
pub const APP_NAME: &str = "PeekOverlay";

/// Animation and window-manager timings
pub mod timing {
    /// Default animation timer period in milliseconds
    pub const TICK_INTERVAL_MS: u64 = 10;
    /// Default period for re-asserting the topmost z-order in milliseconds
    pub const TOPMOST_INTERVAL_MS: u64 = 1000;
    /// Delay used for animation frames that declare a zero delay
    pub const ZERO_DELAY_FALLBACK_MS: u64 = 100;
    /// Lower bound for the timer period so a bad config can't spin the loop
    pub const MIN_TICK_INTERVAL_MS: u64 = 1;
    /// Lower bound for the topmost period, same reason
    pub const MIN_TOPMOST_INTERVAL_MS: u64 = 100;
}

/// Scaling limits and steps
pub mod scale {
    /// Step used by increase/decrease scale
    pub const STEP: f32 = 0.1;
    /// Smallest scale when limits are enabled
    pub const MIN: f32 = 0.1;
    /// Largest scale when limits are enabled
    pub const MAX: f32 = 10.0;
    /// Absolute floor even when limits are disabled
    pub const FLOOR: f32 = 0.01;
    /// Absolute ceiling even when limits are disabled
    pub const CEILING: f32 = 100.0;
    /// Largest width or height a scaled image may reach, in pixels
    pub const MAX_EXTENT: u32 = 32_768;
    /// A right-drag resize never shrinks a side below this, in pixels
    pub const MIN_DRAG_EXTENT: u32 = 50;
}

/// Animation playback speed, in percent of the native speed
pub mod speed {
    pub const DEFAULT: u32 = 100;
    pub const MIN: u32 = 10;
    pub const MAX: u32 = 1000;
}

/// Default hotkey binding
pub const DEFAULT_HOTKEY: &str = "ctrl+alt+o";

/// File extensions the gallery and the file dialog accept
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp"];

/// Memory budget for composed frames kept around between ticks
pub const FRAME_CACHE_BUDGET_BYTES: usize = 256 * 1024 * 1024;

/// Fallback monitor size when the OS reports none
pub mod display {
    pub const FALLBACK_WIDTH: u32 = 1920;
    pub const FALLBACK_HEIGHT: u32 = 1080;
}
