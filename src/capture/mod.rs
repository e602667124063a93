//! Platform-specific capture implementations
//!
//! This module provides screen and audio capture for each platform.

pub mod audio;
pub mod region;
pub mod traits;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "windows")]
pub mod windows;

use std::sync::Arc;

pub use audio::{AudioChunk, AudioFormat, AudioInput, AudioSource, CpalAudioInput, OpenStream};
pub use region::{resolve_region, MIN_SELECTION_SIZE};
pub use traits::{
    AudioDeviceInfo, CaptureError, CaptureRegion, CaptureResult, CapturedFrame, DisplayInfo,
    FrameSource, RegionResolver, RegionSource, WindowHandle,
};

/// Frame source for the current platform
pub fn default_frame_source() -> Arc<dyn FrameSource> {
    #[cfg(target_os = "macos")]
    {
        Arc::new(macos::screen::CgScreen::new())
    }

    #[cfg(target_os = "windows")]
    {
        Arc::new(windows::screen::GdiScreen::new())
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        Arc::new(UnsupportedPlatform)
    }
}

/// Region resolver for the current platform
pub fn default_region_resolver() -> Arc<dyn RegionResolver> {
    #[cfg(target_os = "macos")]
    {
        Arc::new(macos::screen::CgScreen::new())
    }

    #[cfg(target_os = "windows")]
    {
        Arc::new(windows::screen::GdiScreen::new())
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        Arc::new(UnsupportedPlatform)
    }
}

/// Get list of available displays
pub fn get_displays() -> Vec<DisplayInfo> {
    #[cfg(target_os = "macos")]
    {
        macos::screen::get_displays()
    }

    #[cfg(target_os = "windows")]
    {
        windows::screen::get_displays()
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        Vec::new()
    }
}

/// Stand-in for platforms without native screen capture.
///
/// Every call fails with `CaptureUnavailable`; callers on these platforms
/// inject their own [`FrameSource`].
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedPlatform;

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
impl FrameSource for UnsupportedPlatform {
    fn prepare(&self, _region: &CaptureRegion) -> CaptureResult<()> {
        Err(unsupported_capture())
    }

    fn capture(&self, _region: &CaptureRegion) -> CaptureResult<CapturedFrame> {
        Err(unsupported_capture())
    }
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn unsupported_capture() -> CaptureError {
    CaptureError::unavailable(format!(
        "screen capture is not supported on {}",
        std::env::consts::OS
    ))
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
impl RegionResolver for UnsupportedPlatform {
    fn primary_display_bounds(&self) -> CaptureResult<CaptureRegion> {
        Err(CaptureError::unavailable("display enumeration is not supported"))
    }

    fn window_bounds(&self, _handle: WindowHandle) -> CaptureResult<CaptureRegion> {
        Err(CaptureError::unavailable("window lookup is not supported"))
    }
}
