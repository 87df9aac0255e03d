// app/mod.rs - Overlay State and Controller
//
// Platform-independent core: the state struct and the controller that
// drives a PlatformOverlaySurface from it.

mod controller;
mod state;

pub use controller::*;
pub use state::*;
