//! macOS screen capture using CoreGraphics window-list snapshots
//!
//! Each frame is a `CGDisplay::screenshot` of the capture rectangle. Retina
//! displays return more pixels than the rectangle has points, so frames are
//! sampled back down to the region size.

use crate::capture::traits::{
    CaptureError, CaptureRegion, CaptureResult, CapturedFrame, DisplayInfo, FrameSource,
    RegionResolver, WindowHandle,
};
use core_foundation::base::{CFType, TCFType};
use core_foundation::dictionary::{CFDictionary, CFDictionaryRef};
use core_foundation::string::CFString;
use core_graphics::display::CGDisplay;
use core_graphics::geometry::{CGPoint, CGRect, CGSize};
use core_graphics::image::CGImage;
use core_graphics::window::{
    copy_window_info, kCGNullWindowID, kCGWindowBounds, kCGWindowImageDefault,
    kCGWindowListOptionIncludingWindow, kCGWindowListOptionOnScreenOnly, CGWindowID,
};

/// Get list of available displays
pub fn get_displays() -> Vec<DisplayInfo> {
    let display_ids = CGDisplay::active_displays().unwrap_or_default();

    display_ids
        .iter()
        .enumerate()
        .map(|(index, &id)| {
            let display = CGDisplay::new(id);
            let bounds = display.bounds();
            let is_main = display.is_main();

            DisplayInfo {
                id,
                name: if is_main {
                    "Main Display".to_string()
                } else {
                    format!("Display {}", index + 1)
                },
                x: bounds.origin.x as i32,
                y: bounds.origin.y as i32,
                width: bounds.size.width as u32,
                height: bounds.size.height as u32,
                is_primary: is_main,
            }
        })
        .collect()
}

/// CoreGraphics-backed frame source and region resolver
#[derive(Debug, Default, Clone, Copy)]
pub struct CgScreen;

impl CgScreen {
    pub fn new() -> Self {
        Self
    }
}

impl FrameSource for CgScreen {
    fn prepare(&self, _region: &CaptureRegion) -> CaptureResult<()> {
        if !super::permissions::has_screen_recording_permission() {
            super::permissions::request_screen_recording_permission();
            return Err(CaptureError::unavailable(
                "Screen recording permission not granted. Please allow in System Settings.",
            ));
        }
        Ok(())
    }

    fn capture(&self, region: &CaptureRegion) -> CaptureResult<CapturedFrame> {
        let rect = CGRect::new(
            &CGPoint::new(region.x as f64, region.y as f64),
            &CGSize::new(region.width as f64, region.height as f64),
        );

        let image = CGDisplay::screenshot(
            rect,
            kCGWindowListOptionOnScreenOnly,
            kCGNullWindowID,
            kCGWindowImageDefault,
        )
        .ok_or_else(|| CaptureError::unavailable(format!("screenshot of {} failed", region)))?;

        image_to_rgba(&image, region.width, region.height)
    }
}

impl RegionResolver for CgScreen {
    fn primary_display_bounds(&self) -> CaptureResult<CaptureRegion> {
        let bounds = CGDisplay::main().bounds();
        if bounds.size.width <= 0.0 || bounds.size.height <= 0.0 {
            return Err(CaptureError::unavailable("main display has no size"));
        }
        Ok(CaptureRegion::new(
            bounds.origin.x as i32,
            bounds.origin.y as i32,
            bounds.size.width as u32,
            bounds.size.height as u32,
        ))
    }

    fn window_bounds(&self, handle: WindowHandle) -> CaptureResult<CaptureRegion> {
        let missing = || CaptureError::unavailable(format!("window {} no longer exists", handle.0));

        let window_list = copy_window_info(kCGWindowListOptionIncludingWindow, handle.0 as CGWindowID)
            .ok_or_else(missing)?;

        let entry = window_list.iter().next().ok_or_else(missing)?;
        let info: CFDictionary =
            unsafe { CFDictionary::wrap_under_get_rule(*entry as CFDictionaryRef) };

        let key = unsafe { CFString::wrap_under_get_rule(kCGWindowBounds) };
        let value = info.find(key.as_CFTypeRef()).ok_or_else(missing)?;
        let value = unsafe { CFType::wrap_under_get_rule(*value) };
        let bounds_dict = value
            .downcast::<CFDictionary>()
            .ok_or_else(|| CaptureError::unavailable("window bounds are malformed"))?;

        let bounds = CGRect::from_dict_representation(&bounds_dict)
            .ok_or_else(|| CaptureError::unavailable("window bounds are malformed"))?;

        Ok(CaptureRegion::new(
            bounds.origin.x as i32,
            bounds.origin.y as i32,
            bounds.size.width.max(0.0) as u32,
            bounds.size.height.max(0.0) as u32,
        ))
    }
}

/// Copy a 32-bit BGRA image into an RGBA frame of `width` x `height`
fn image_to_rgba(image: &CGImage, width: u32, height: u32) -> CaptureResult<CapturedFrame> {
    if image.bits_per_pixel() != 32 {
        return Err(CaptureError::unavailable(format!(
            "unexpected {} bits per pixel",
            image.bits_per_pixel()
        )));
    }

    let data = image.data();
    let data = data.bytes();

    Ok(CapturedFrame {
        data: sample_bgra(
            data,
            image.width(),
            image.height(),
            image.bytes_per_row(),
            width,
            height,
        ),
        width,
        height,
    })
}

/// Nearest-neighbour sample of a BGRA buffer into a tightly packed RGBA one
fn sample_bgra(
    src: &[u8],
    src_width: usize,
    src_height: usize,
    bytes_per_row: usize,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let (width, height) = (width as usize, height as usize);
    let mut out = vec![0u8; width * height * 4];
    if src_width == 0 || src_height == 0 {
        return out;
    }

    for y in 0..height {
        let sy = (y * src_height / height).min(src_height - 1);
        for x in 0..width {
            let sx = (x * src_width / width).min(src_width - 1);
            let s = sy * bytes_per_row + sx * 4;
            let d = (y * width + x) * 4;
            if let Some(px) = src.get(s..s + 4) {
                out[d] = px[2];
                out[d + 1] = px[1];
                out[d + 2] = px[0];
                out[d + 3] = 255;
            }
        }
    }

    out
}
