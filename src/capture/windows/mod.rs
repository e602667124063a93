//! Windows capture implementations
//!
//! Uses GDI for screen capture. Audio loopback goes through cpal's WASAPI
//! backend in [`crate::capture::audio`].

pub mod screen;

pub use screen::{get_displays, GdiScreen};
