//! Capture trait definitions
//!
//! Platform-agnostic types and traits for capture sources.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by a single frame grab or region lookup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Capture unavailable: {0}")]
    CaptureUnavailable(String),
}

impl CaptureError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::CaptureUnavailable(reason.into())
    }
}

/// Result type for frame source operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Axis-aligned capture rectangle in screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRegion {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRegion {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Width and height are both non-zero
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Both sides are at least `min` pixels
    pub fn meets_minimum(&self, min: u32) -> bool {
        self.width >= min && self.height >= min
    }
}

impl std::fmt::Display for CaptureRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Opaque platform window handle (HWND on Windows, CGWindowID on macOS)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowHandle(pub u64);

/// How the capture rectangle is chosen by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "mode", content = "value")]
pub enum RegionSource {
    /// Bounds of the primary display
    #[default]
    FullDisplay,
    /// Current screen rectangle of a window
    NamedWindow(WindowHandle),
    /// Rectangle picked by a drag selection
    ExplicitRect(CaptureRegion),
}

/// One still image grabbed from the screen
///
/// Pixels are tightly packed RGBA8, `width * height * 4` bytes.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl CapturedFrame {
    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 4
    }

    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() == Self::expected_len(self.width, self.height)
    }
}

/// Grabs still images of a screen rectangle on demand.
///
/// Implementations must release every drawing surface they acquire before
/// returning, on success and on failure.
pub trait FrameSource: Send + Sync {
    /// Called once before a session starts. A region that can never be
    /// captured should be refused here rather than on every frame.
    fn prepare(&self, _region: &CaptureRegion) -> CaptureResult<()> {
        Ok(())
    }

    /// Capture one frame of `region`
    fn capture(&self, region: &CaptureRegion) -> CaptureResult<CapturedFrame>;
}

/// Looks up the screen rectangles a capture can target
pub trait RegionResolver: Send + Sync {
    fn primary_display_bounds(&self) -> CaptureResult<CaptureRegion>;

    fn window_bounds(&self, handle: WindowHandle) -> CaptureResult<CaptureRegion>;
}

/// Information about a display/screen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayInfo {
    /// Unique display ID
    pub id: u32,

    /// Display name
    pub name: String,

    /// Position of the display in the virtual screen
    pub x: i32,
    pub y: i32,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Whether this is the primary display
    pub is_primary: bool,
}

/// Information about an audio device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDeviceInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,

    /// Whether this is an input device
    pub is_input: bool,

    /// Whether this is the default device
    pub is_default: bool,
}
