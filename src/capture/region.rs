//! Capture region resolution
//!
//! Turns a caller's choice of full display, window or drag selection into a
//! concrete rectangle before the session starts.

use crate::capture::traits::{CaptureRegion, RegionResolver, RegionSource};
use crate::recorder::channel::{RecordingError, RecordingResult};

/// Smallest drag selection accepted on either side, in pixels
pub const MIN_SELECTION_SIZE: u32 = 50;

/// Resolve `source` into the rectangle to record
pub fn resolve_region(
    source: &RegionSource,
    resolver: &dyn RegionResolver,
) -> RecordingResult<CaptureRegion> {
    let region = match source {
        RegionSource::FullDisplay => resolver.primary_display_bounds()?,
        RegionSource::NamedWindow(handle) => {
            let bounds = resolver.window_bounds(*handle)?;
            if !bounds.is_valid() {
                // Minimized windows report an empty rectangle
                return Err(RecordingError::CaptureUnavailable(format!(
                    "window {} has empty bounds",
                    handle.0
                )));
            }
            bounds
        }
        RegionSource::ExplicitRect(rect) => {
            if !rect.meets_minimum(MIN_SELECTION_SIZE) {
                return Err(RecordingError::InvalidConfig(format!(
                    "selected area {}x{} is smaller than {}x{}",
                    rect.width, rect.height, MIN_SELECTION_SIZE, MIN_SELECTION_SIZE
                )));
            }
            *rect
        }
    };

    tracing::debug!("Resolved {:?} to region {}", source, region);
    Ok(region)
}
