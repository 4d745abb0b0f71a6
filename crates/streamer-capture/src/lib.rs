//! streamer-capture — desktop bitmap capture.
//!
//! On Windows the desktop is grabbed through GDI into a 32-bit DIB section.
//! On every other target a moving test pattern stands in so the encode path
//! still runs end to end.
//!
//! # Windows path
//!
//! ```text
//! GetDC(NULL) ── screen DC
//!   │  CreateCompatibleDC + CreateDIBSection (BGRA8, bottom-up)
//!   ▼
//! StretchBlt / BitBlt (SRCCOPY) into the DIB
//!   │
//!   ▼
//! Vec<u8> BGRA8 → CapturedBitmap (caller-owned)
//! ```

use streamer_core::{CaptureError, CapturedBitmap, Resolution};

pub mod pattern;

/// Configuration for a capture source.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub width:  u32,
    pub height: u32,
}

impl CaptureConfig {
    pub fn new(resolution: Resolution) -> Self {
        Self { width: resolution.width, height: resolution.height }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

/// Something that produces desktop snapshots at a fixed resolution.
///
/// Every call returns a freshly allocated bitmap owned by the caller.
pub trait ScreenSource {
    fn resolution(&self) -> Resolution;

    fn capture(&mut self) -> Result<CapturedBitmap, CaptureError>;
}

impl<S: ScreenSource + ?Sized> ScreenSource for &mut S {
    fn resolution(&self) -> Resolution {
        (**self).resolution()
    }

    fn capture(&mut self) -> Result<CapturedBitmap, CaptureError> {
        (**self).capture()
    }
}

// ── Platform split ─────────────────────────────────────────────────────────────

#[cfg(target_os = "windows")]
mod gdi;
#[cfg(target_os = "windows")]
pub use gdi::ScreenCapturer;

#[cfg(not(target_os = "windows"))]
mod stub;
#[cfg(not(target_os = "windows"))]
pub use stub::ScreenCapturer;
