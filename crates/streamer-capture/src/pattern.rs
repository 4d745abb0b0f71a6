//! Synthetic capture source: vertical colour bars that scroll one bar width
//! every `frames_per_step` frames.

use streamer_core::{CaptureError, CapturedBitmap, Resolution};

use crate::ScreenSource;

/// BGRA colour bars, left to right: white, yellow, cyan, green, magenta, red, blue, black.
const BARS: [[u8; 4]; 8] = [
    [0xFF, 0xFF, 0xFF, 0xFF],
    [0x00, 0xFF, 0xFF, 0xFF],
    [0xFF, 0xFF, 0x00, 0xFF],
    [0x00, 0xFF, 0x00, 0xFF],
    [0xFF, 0x00, 0xFF, 0xFF],
    [0x00, 0x00, 0xFF, 0xFF],
    [0xFF, 0x00, 0x00, 0xFF],
    [0x00, 0x00, 0x00, 0xFF],
];

pub struct TestPattern {
    resolution:      Resolution,
    frame:           u64,
    frames_per_step: u64,
}

impl TestPattern {
    pub fn new(resolution: Resolution) -> Result<Self, CaptureError> {
        if resolution.is_empty() {
            return Err(CaptureError::InvalidResolution(resolution));
        }
        Ok(Self { resolution, frame: 0, frames_per_step: 5 })
    }

    /// Frames captured so far.
    pub fn frames(&self) -> u64 {
        self.frame
    }

    fn bar_at(&self, x: u32) -> [u8; 4] {
        let bar_width = (self.resolution.width as usize / BARS.len()).max(1);
        let shift = (self.frame / self.frames_per_step) as usize;
        BARS[(x as usize / bar_width + shift) % BARS.len()]
    }
}

impl ScreenSource for TestPattern {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn capture(&mut self) -> Result<CapturedBitmap, CaptureError> {
        let Resolution { width, height } = self.resolution;
        let mut row = Vec::with_capacity(width as usize * CapturedBitmap::BYTES_PER_PIXEL);
        for x in 0..width {
            row.extend_from_slice(&self.bar_at(x));
        }
        // Bars are vertical, so every stored row is the same regardless of orientation.
        let data = row.repeat(height as usize);
        self.frame += 1;
        CapturedBitmap::new(width, height, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_bitmaps_of_requested_size() {
        let mut pattern = TestPattern::new(Resolution::new(64, 32)).unwrap();
        let bmp = pattern.capture().unwrap();
        assert_eq!(bmp.resolution(), Resolution::new(64, 32));
        assert_eq!(bmp.data.len(), 64 * 32 * 4);
        assert_eq!(pattern.frames(), 1);
    }

    #[test]
    fn bars_scroll_over_time() {
        let mut pattern = TestPattern::new(Resolution::new(64, 2)).unwrap();
        let first = pattern.capture().unwrap();
        for _ in 0..4 {
            pattern.capture().unwrap();
        }
        let later = pattern.capture().unwrap();
        assert_ne!(first.stored_row(0), later.stored_row(0));
    }

    #[test]
    fn empty_resolution_is_rejected() {
        assert!(TestPattern::new(Resolution::new(0, 10)).is_err());
    }
}
