// ui/mod.rs - Tray User Interface
//
// The overlay has no windows of its own to interact with; everything goes
// through the tray menu. Windows only.

mod tray;

pub use tray::{SystemTray, TrayAction};
