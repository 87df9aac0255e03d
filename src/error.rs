// error.rs - Overlay Error Taxonomy
//
// Load and hotkey failures are recoverable and leave the overlay as it was.
// WindowInit is fatal: without the layered window there is no overlay.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OverlayError {
    /// The image could not be read or decoded (corrupt or unsupported file)
    #[error("failed to load image {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    /// The OS refused to create or style the overlay window
    #[error("overlay window initialization failed: {0}")]
    WindowInit(String),

    /// The hotkey is already claimed by the OS or another application
    #[error("hotkey '{binding}' could not be registered: {reason}")]
    HotkeyConflict { binding: String, reason: String },

    /// The hotkey string could not be parsed
    #[error("invalid hotkey '{binding}': {reason}")]
    InvalidHotkey { binding: String, reason: String },

    /// Gallery bookkeeping failed (bad name, missing entry, ...)
    #[error("gallery: {0}")]
    Gallery(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl OverlayError {
    pub fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the application can keep running after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::WindowInit(_))
    }
}

pub type Result<T> = std::result::Result<T, OverlayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_window_init_is_fatal() {
        assert!(!OverlayError::WindowInit("no compositor".into()).is_recoverable());
        assert!(OverlayError::load("a.gif", "truncated").is_recoverable());
        assert!(OverlayError::HotkeyConflict {
            binding: "ctrl+alt+o".into(),
            reason: "taken".into(),
        }
        .is_recoverable());
    }

    #[test]
    fn load_error_names_the_file() {
        let msg = OverlayError::load("cat.webp", "bad header").to_string();
        assert!(msg.contains("cat.webp"));
        assert!(msg.contains("bad header"));
    }
}
