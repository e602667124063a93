//! Windows screen capture using GDI BitBlt
//!
//! Frames are copied from the desktop device context one rectangle at a time.
//! Every GDI object is held by a guard so it is released on all paths.

use crate::capture::traits::{
    CaptureError, CaptureRegion, CaptureResult, CapturedFrame, DisplayInfo, FrameSource,
    RegionResolver, WindowHandle,
};
use std::mem::zeroed;
use windows::{
    Win32::Foundation::{BOOL, HWND, LPARAM, RECT},
    Win32::Graphics::Gdi::{
        BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject,
        EnumDisplayMonitors, GetDC, GetDIBits, GetMonitorInfoW, ReleaseDC, SelectObject,
        BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, HBITMAP, HDC, HGDIOBJ, HMONITOR,
        MONITORINFOEXW, SRCCOPY,
    },
    Win32::UI::WindowsAndMessaging::{
        GetDesktopWindow, GetSystemMetrics, GetWindowRect, IsIconic, IsWindow, SM_CXSCREEN,
        SM_CXVIRTUALSCREEN, SM_CYSCREEN, SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN,
        SM_YVIRTUALSCREEN,
    },
};

/// Get list of available displays on Windows
pub fn get_displays() -> Vec<DisplayInfo> {
    let mut displays = Vec::new();
    let displays_ptr = &mut displays as *mut Vec<DisplayInfo>;

    unsafe extern "system" fn enum_monitors_callback(
        hmonitor: HMONITOR,
        _hdc: HDC,
        _rect: *mut RECT,
        lparam: LPARAM,
    ) -> BOOL {
        let displays = &mut *(lparam.0 as *mut Vec<DisplayInfo>);

        let mut monitor_info: MONITORINFOEXW = unsafe { zeroed() };
        monitor_info.monitorInfo.cbSize = std::mem::size_of::<MONITORINFOEXW>() as u32;

        if unsafe { GetMonitorInfoW(hmonitor, &mut monitor_info.monitorInfo) }.as_bool() {
            let rect = monitor_info.monitorInfo.rcMonitor;
            let is_primary = (monitor_info.monitorInfo.dwFlags & 1) != 0; // MONITORINFOF_PRIMARY

            let name_len = monitor_info
                .szDevice
                .iter()
                .position(|&c| c == 0)
                .unwrap_or(monitor_info.szDevice.len());
            let name = String::from_utf16_lossy(&monitor_info.szDevice[..name_len]);

            displays.push(DisplayInfo {
                id: displays.len() as u32,
                name: if is_primary {
                    "Primary Display".to_string()
                } else {
                    name
                },
                x: rect.left,
                y: rect.top,
                width: (rect.right - rect.left) as u32,
                height: (rect.bottom - rect.top) as u32,
                is_primary,
            });
        }

        BOOL::from(true)
    }

    unsafe {
        let _ = EnumDisplayMonitors(
            HDC::default(),
            None,
            Some(enum_monitors_callback),
            LPARAM(displays_ptr as isize),
        );
    }

    displays
}

/// Desktop DC obtained with GetDC, released with ReleaseDC
struct ScreenDc {
    hwnd: HWND,
    hdc: HDC,
}

impl ScreenDc {
    fn acquire() -> CaptureResult<Self> {
        unsafe {
            let hwnd = GetDesktopWindow();
            let hdc = GetDC(hwnd);
            if hdc.is_invalid() {
                return Err(CaptureError::unavailable("GetDC failed for desktop window"));
            }
            Ok(Self { hwnd, hdc })
        }
    }
}

impl Drop for ScreenDc {
    fn drop(&mut self) {
        unsafe {
            ReleaseDC(self.hwnd, self.hdc);
        }
    }
}

/// Memory DC created with CreateCompatibleDC
struct MemoryDc(HDC);

impl Drop for MemoryDc {
    fn drop(&mut self) {
        unsafe {
            let _ = DeleteDC(self.0);
        }
    }
}

/// Bitmap created with CreateCompatibleBitmap
struct Bitmap(HBITMAP);

impl Drop for Bitmap {
    fn drop(&mut self) {
        unsafe {
            let _ = DeleteObject(self.0);
        }
    }
}

/// Restores the DC's previous object when dropped
struct Selection {
    dc: HDC,
    previous: HGDIOBJ,
}

impl Drop for Selection {
    fn drop(&mut self) {
        unsafe {
            SelectObject(self.dc, self.previous);
        }
    }
}

/// Capture a rectangle of the virtual screen as RGBA
fn capture_region(region: &CaptureRegion) -> CaptureResult<CapturedFrame> {
    let width = region.width as i32;
    let height = region.height as i32;

    unsafe {
        let screen = ScreenDc::acquire()?;

        let memory = MemoryDc(CreateCompatibleDC(screen.hdc));
        if memory.0.is_invalid() {
            return Err(CaptureError::unavailable("CreateCompatibleDC failed"));
        }

        let bitmap = Bitmap(CreateCompatibleBitmap(screen.hdc, width, height));
        if bitmap.0.is_invalid() {
            return Err(CaptureError::unavailable("CreateCompatibleBitmap failed"));
        }

        let _selection = Selection {
            dc: memory.0,
            previous: SelectObject(memory.0, bitmap.0),
        };

        BitBlt(
            memory.0,
            0,
            0,
            width,
            height,
            screen.hdc,
            region.x,
            region.y,
            SRCCOPY,
        )
        .map_err(|e| CaptureError::unavailable(format!("BitBlt failed: {}", e)))?;

        let mut bmi: BITMAPINFO = zeroed();
        bmi.bmiHeader.biSize = std::mem::size_of::<BITMAPINFOHEADER>() as u32;
        bmi.bmiHeader.biWidth = width;
        bmi.bmiHeader.biHeight = -height; // Negative for top-down
        bmi.bmiHeader.biPlanes = 1;
        bmi.bmiHeader.biBitCount = 32; // BGRA
        bmi.bmiHeader.biCompression = BI_RGB.0;

        let mut buffer = vec![0u8; CapturedFrame::expected_len(region.width, region.height)];

        let lines = GetDIBits(
            memory.0,
            bitmap.0,
            0,
            region.height,
            Some(buffer.as_mut_ptr() as *mut _),
            &mut bmi,
            DIB_RGB_COLORS,
        );

        if lines == 0 {
            return Err(CaptureError::unavailable("GetDIBits returned no lines"));
        }

        bgra_to_rgba(&mut buffer);

        Ok(CapturedFrame {
            data: buffer,
            width: region.width,
            height: region.height,
        })
    }
}

/// Swap blue and red in place and force opaque alpha
fn bgra_to_rgba(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        px.swap(0, 2);
        px[3] = 255;
    }
}

fn to_hwnd(handle: WindowHandle) -> HWND {
    HWND(handle.0 as isize as *mut _)
}

/// GDI-backed frame source and region resolver
#[derive(Debug, Default, Clone, Copy)]
pub struct GdiScreen;

impl GdiScreen {
    pub fn new() -> Self {
        Self
    }

    fn virtual_screen() -> CaptureRegion {
        unsafe {
            CaptureRegion::new(
                GetSystemMetrics(SM_XVIRTUALSCREEN),
                GetSystemMetrics(SM_YVIRTUALSCREEN),
                GetSystemMetrics(SM_CXVIRTUALSCREEN).max(0) as u32,
                GetSystemMetrics(SM_CYVIRTUALSCREEN).max(0) as u32,
            )
        }
    }
}

impl FrameSource for GdiScreen {
    fn prepare(&self, region: &CaptureRegion) -> CaptureResult<()> {
        let screen = Self::virtual_screen();
        let right = screen.x + screen.width as i32;
        let bottom = screen.y + screen.height as i32;
        let overlaps = region.x < right
            && region.y < bottom
            && region.x + region.width as i32 > screen.x
            && region.y + region.height as i32 > screen.y;

        if !overlaps {
            return Err(CaptureError::unavailable(format!(
                "region {} lies outside the virtual screen {}",
                region, screen
            )));
        }
        Ok(())
    }

    fn capture(&self, region: &CaptureRegion) -> CaptureResult<CapturedFrame> {
        capture_region(region)
    }
}

impl RegionResolver for GdiScreen {
    fn primary_display_bounds(&self) -> CaptureResult<CaptureRegion> {
        let (width, height) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
        if width <= 0 || height <= 0 {
            return Err(CaptureError::unavailable("primary display has no size"));
        }
        Ok(CaptureRegion::new(0, 0, width as u32, height as u32))
    }

    fn window_bounds(&self, handle: WindowHandle) -> CaptureResult<CaptureRegion> {
        let hwnd = to_hwnd(handle);
        unsafe {
            if !IsWindow(hwnd).as_bool() {
                return Err(CaptureError::unavailable(format!(
                    "window {} no longer exists",
                    handle.0
                )));
            }
            if IsIconic(hwnd).as_bool() {
                return Err(CaptureError::unavailable(format!(
                    "window {} is minimized",
                    handle.0
                )));
            }

            let mut rect = RECT::default();
            GetWindowRect(hwnd, &mut rect)
                .map_err(|e| CaptureError::unavailable(format!("GetWindowRect failed: {}", e)))?;

            Ok(CaptureRegion::new(
                rect.left,
                rect.top,
                (rect.right - rect.left).max(0) as u32,
                (rect.bottom - rect.top).max(0) as u32,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgra_to_rgba() {
        let mut pixels = vec![1, 2, 3, 0, 10, 20, 30, 7];
        bgra_to_rgba(&mut pixels);
        assert_eq!(pixels, vec![3, 2, 1, 255, 30, 20, 10, 255]);
    }
}
