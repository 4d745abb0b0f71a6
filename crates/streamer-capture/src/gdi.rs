//! GDI desktop capture.
//!
//! The DIB section is created once with a positive height, so GDI stores it
//! bottom-up; each capture copies it out unchanged and leaves the flip to the
//! frame converter.

use std::ffi::c_void;
use std::mem::size_of;
use std::ptr::null_mut;

use streamer_core::{CaptureError, CapturedBitmap, Resolution};
use windows::Win32::Foundation::{HANDLE, HWND};
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleDC, CreateDIBSection, DeleteDC, DeleteObject, GdiFlush, GetDC,
    ReleaseDC, SelectObject, SetStretchBltMode, StretchBlt, BITMAPINFO, BITMAPINFOHEADER, BI_RGB,
    CAPTUREBLT, DIB_RGB_COLORS, HALFTONE, HBITMAP, HDC, HGDIOBJ, ROP_CODE, SRCCOPY,
};
use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

use super::{CaptureConfig, ScreenSource};

fn platform(call: &'static str, reason: impl ToString) -> CaptureError {
    CaptureError::Platform { call, reason: reason.to_string() }
}

// ── ScreenCapturer ─────────────────────────────────────────────────────────────

pub struct ScreenCapturer {
    config:          CaptureConfig,
    screen_dc:       HDC,
    mem_dc:          HDC,
    bitmap:          HBITMAP,
    original_bitmap: HGDIOBJ,
    bits:            *mut u8,
    screen_width:    i32,
    screen_height:   i32,
}

impl ScreenCapturer {
    /// Prepare a GDI capture surface of `config.width × config.height`.
    ///
    /// The primary screen is scaled to that size when they differ.
    pub fn open(config: CaptureConfig) -> Result<Self, CaptureError> {
        let resolution = config.resolution();
        if resolution.is_empty() {
            return Err(CaptureError::InvalidResolution(resolution));
        }

        let screen_width = unsafe { GetSystemMetrics(SM_CXSCREEN) };
        let screen_height = unsafe { GetSystemMetrics(SM_CYSCREEN) };
        if screen_width <= 0 || screen_height <= 0 {
            return Err(platform("GetSystemMetrics", "primary screen has no size"));
        }

        let screen_dc = unsafe { GetDC(HWND(null_mut())) };
        if screen_dc.0.is_null() {
            return Err(platform("GetDC", "returned null"));
        }

        let mem_dc = unsafe { CreateCompatibleDC(screen_dc) };
        if mem_dc.0.is_null() {
            unsafe {
                let _ = ReleaseDC(HWND(null_mut()), screen_dc);
            }
            return Err(platform("CreateCompatibleDC", "returned null"));
        }

        let mut info = BITMAPINFO::default();
        info.bmiHeader.biSize = size_of::<BITMAPINFOHEADER>() as u32;
        info.bmiHeader.biWidth = config.width as i32;
        // Positive height: bottom-up row order.
        info.bmiHeader.biHeight = config.height as i32;
        info.bmiHeader.biPlanes = 1;
        info.bmiHeader.biBitCount = 32;
        info.bmiHeader.biCompression = BI_RGB.0;

        let mut bits: *mut c_void = null_mut();
        let bitmap = match unsafe {
            CreateDIBSection(mem_dc, &info, DIB_RGB_COLORS, &mut bits, HANDLE::default(), 0)
        } {
            Ok(bitmap) if !bits.is_null() => bitmap,
            Ok(bitmap) => {
                unsafe {
                    let _ = DeleteObject(bitmap);
                    let _ = DeleteDC(mem_dc);
                    let _ = ReleaseDC(HWND(null_mut()), screen_dc);
                }
                return Err(platform("CreateDIBSection", "returned a null pixel buffer"));
            }
            Err(e) => {
                unsafe {
                    let _ = DeleteDC(mem_dc);
                    let _ = ReleaseDC(HWND(null_mut()), screen_dc);
                }
                return Err(platform("CreateDIBSection", e));
            }
        };

        let original_bitmap = unsafe { SelectObject(mem_dc, bitmap) };
        unsafe {
            SetStretchBltMode(mem_dc, HALFTONE);
        }

        tracing::info!(
            "GDI capture ready: screen {}x{} → {}x{}",
            screen_width, screen_height, config.width, config.height
        );

        Ok(Self {
            config,
            screen_dc,
            mem_dc,
            bitmap,
            original_bitmap,
            bits: bits.cast(),
            screen_width,
            screen_height,
        })
    }

    fn blit(&self) -> Result<(), CaptureError> {
        let rop = ROP_CODE(SRCCOPY.0 | CAPTUREBLT.0);
        let (w, h) = (self.config.width as i32, self.config.height as i32);

        if w == self.screen_width && h == self.screen_height {
            unsafe { BitBlt(self.mem_dc, 0, 0, w, h, self.screen_dc, 0, 0, rop) }
                .map_err(|e| platform("BitBlt", e))?;
        } else {
            let ok = unsafe {
                StretchBlt(
                    self.mem_dc,
                    0,
                    0,
                    w,
                    h,
                    self.screen_dc,
                    0,
                    0,
                    self.screen_width,
                    self.screen_height,
                    rop,
                )
            };
            if !ok.as_bool() {
                return Err(platform("StretchBlt", "returned FALSE"));
            }
        }
        unsafe {
            let _ = GdiFlush();
        }
        Ok(())
    }
}

impl ScreenSource for ScreenCapturer {
    fn resolution(&self) -> Resolution {
        self.config.resolution()
    }

    fn capture(&mut self) -> Result<CapturedBitmap, CaptureError> {
        self.blit()?;
        let len = self.config.width as usize
            * self.config.height as usize
            * CapturedBitmap::BYTES_PER_PIXEL;
        // SAFETY: `bits` points at the DIB section's pixel buffer, which is
        // width × height × 4 bytes (32 bpp rows are always DWORD aligned) and
        // lives until `bitmap` is deleted in Drop.
        let pixels = unsafe { std::slice::from_raw_parts(self.bits, len) };
        CapturedBitmap::new(self.config.width, self.config.height, pixels.to_vec())
    }
}

impl Drop for ScreenCapturer {
    fn drop(&mut self) {
        unsafe {
            let _ = SelectObject(self.mem_dc, self.original_bitmap);
            let _ = DeleteObject(self.bitmap);
            let _ = DeleteDC(self.mem_dc);
            let _ = ReleaseDC(HWND(null_mut()), self.screen_dc);
        }
    }
}
