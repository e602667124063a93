//! macOS capture implementations
//!
//! Uses CoreGraphics for screen capture. Audio goes through cpal's CoreAudio
//! backend in [`crate::capture::audio`].

pub mod permissions;
pub mod screen;

pub use permissions::*;
pub use screen::{get_displays, CgScreen};
