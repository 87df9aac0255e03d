// utils.rs - Common Utility Functions
//
// Shared helpers used by the controller, settings and the Win32 surface.

/// Clamp a value into [0, 1]. NaN maps to 0.
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Convert a [0, 1] opacity into the 0..=255 alpha the compositor expects
pub fn opacity_to_alpha(opacity: f32) -> u8 {
    (clamp_unit(opacity) * 255.0).round() as u8
}

/// Parse `#RRGGBB` or `#RRGGBBAA` into RGBA
pub fn parse_hex_color(s: &str) -> Option<[u8; 4]> {
    let hex = s.trim().strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        6 => Some([byte(0)?, byte(2)?, byte(4)?, 255]),
        8 => Some([byte(0)?, byte(2)?, byte(4)?, byte(6)?]),
        _ => None,
    }
}

/// Get the raw HWND (as isize) from a winit window
#[cfg(windows)]
pub fn hwnd_from_window(window: &winit::window::Window) -> Option<isize> {
    use raw_window_handle::{HasWindowHandle, RawWindowHandle};

    match window.window_handle().ok()?.as_raw() {
        RawWindowHandle::Win32(handle) => Some(handle.hwnd.get()),
        _ => None,
    }
}
