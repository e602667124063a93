//! macOS permission handling
//!
//! Screen capture needs the Screen Recording privacy grant.

use core_graphics::access::ScreenCaptureAccess;

/// Check if screen recording permission is granted
pub fn has_screen_recording_permission() -> bool {
    ScreenCaptureAccess::preflight()
}

/// Request screen recording permission
///
/// Returns true if permission was already granted. The dialog itself is
/// shown by the system.
pub fn request_screen_recording_permission() -> bool {
    ScreenCaptureAccess::request()
}

