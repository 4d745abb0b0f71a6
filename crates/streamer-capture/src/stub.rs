//! Non-Windows ScreenCapturer (CI + cross-compilation): serves the test pattern.

use streamer_core::{CaptureError, CapturedBitmap, Resolution};

use super::{pattern::TestPattern, CaptureConfig, ScreenSource};

pub struct ScreenCapturer {
    pattern: TestPattern,
}

impl ScreenCapturer {
    pub fn open(config: CaptureConfig) -> Result<Self, CaptureError> {
        tracing::warn!(
            "ScreenCapturer::open stub (non-Windows) {}x{}: capturing a test pattern",
            config.width, config.height
        );
        Ok(Self { pattern: TestPattern::new(config.resolution())? })
    }
}

impl ScreenSource for ScreenCapturer {
    fn resolution(&self) -> Resolution {
        self.pattern.resolution()
    }

    fn capture(&mut self) -> Result<CapturedBitmap, CaptureError> {
        self.pattern.capture()
    }
}
