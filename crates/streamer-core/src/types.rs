use serde::{Deserialize, Serialize};

use crate::errors::CaptureError;

// MARK: - Resolution

/// Picture size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const FHD: Self = Self { width: 1920, height: 1080 };
    pub const HD: Self = Self { width: 1280, height: 720 };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when both dimensions are multiples of two (4:2:0 chroma needs this).
    pub fn is_even(&self) -> bool {
        self.width % 2 == 0 && self.height % 2 == 0
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}×{}", self.width, self.height)
    }
}

// MARK: - Rational

/// A time base fraction. `1/25` means one tick lasts 1/25 s (25 fps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rational {
    pub num: u32,
    pub den: u32,
}

impl Rational {
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// Duration of one tick in nanoseconds.
    pub fn tick_nanos(&self) -> u64 {
        if self.den == 0 {
            return 0;
        }
        1_000_000_000u64 * self.num as u64 / self.den as u64
    }
}

impl std::fmt::Display for Rational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

// MARK: - PixelFormat

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 32-bit packed, bytes in memory order B, G, R, A (GDI `RGBQUAD`).
    Bgra,
    /// Planar 4:2:0: full-size Y plane followed by quarter-size U and V planes.
    I420,
    /// Single 8-bit luma plane.
    Gray8,
}

impl PixelFormat {
    /// Name of the matching GStreamer `video/x-raw` format.
    pub fn gst_name(&self) -> &'static str {
        match self {
            Self::Bgra => "BGRx",
            Self::I420 => "I420",
            Self::Gray8 => "GRAY8",
        }
    }
}

// MARK: - CodecId

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecId {
    H264,
    Mpeg1Video,
}

/// `sequence_end_code` appended after the last packet of an elementary stream.
pub const SEQUENCE_END_CODE: [u8; 4] = [0x00, 0x00, 0x01, 0xB7];

impl CodecId {
    pub fn end_of_stream_marker(&self) -> &'static [u8] {
        &SEQUENCE_END_CODE
    }
}

impl std::fmt::Display for CodecId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::H264 => write!(f, "H.264"),
            Self::Mpeg1Video => write!(f, "MPEG-1 video"),
        }
    }
}

// MARK: - CapturedBitmap

/// One raw desktop snapshot, 32-bit BGRA.
///
/// Rows are stored bottom-up, the way a GDI device-independent bitmap with a
/// positive height lays them out: row 0 in `data` is the bottom of the
/// picture. The frame converter flips them back.
#[derive(Debug, Clone)]
pub struct CapturedBitmap {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Bytes per stored row.
    pub stride: usize,
}

impl CapturedBitmap {
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Wrap a tightly packed BGRA buffer.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, CaptureError> {
        let stride = width as usize * Self::BYTES_PER_PIXEL;
        let expected = stride * height as usize;
        if data.len() != expected {
            return Err(CaptureError::BufferMismatch { expected, actual: data.len() });
        }
        Ok(Self { data, width, height, stride })
    }

    /// A bitmap filled with a single BGRA colour.
    pub fn solid(width: u32, height: u32, bgra: [u8; 4]) -> Self {
        let pixels = width as usize * height as usize;
        let data = bgra.iter().copied().cycle().take(pixels * Self::BYTES_PER_PIXEL).collect();
        Self { data, width, height, stride: width as usize * Self::BYTES_PER_PIXEL }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Stored row `row` (0 = first row in memory).
    pub fn stored_row(&self, row: usize) -> &[u8] {
        let start = row * self.stride;
        &self.data[start..start + self.width as usize * Self::BYTES_PER_PIXEL]
    }
}

// MARK: - Yuv420Frame

/// One frame in planar I420, allocated once per session and refilled per frame.
#[derive(Debug, Clone)]
pub struct Yuv420Frame {
    resolution: Resolution,
    /// Presentation timestamp in time-base ticks (the frame's sequence index).
    pub pts: i64,
    planes: [Vec<u8>; 3],
    strides: [usize; 3],
}

impl Yuv420Frame {
    pub const PLANES: usize = 3;

    pub fn new(resolution: Resolution) -> Self {
        let (cw, ch) = chroma_size(resolution);
        let w = resolution.width as usize;
        let h = resolution.height as usize;
        Self {
            resolution,
            pts: 0,
            planes: [vec![0; w * h], vec![128; cw * ch], vec![128; cw * ch]],
            strides: [w, cw, cw],
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn plane(&self, index: usize) -> &[u8] {
        &self.planes[index]
    }

    pub fn stride(&self, index: usize) -> usize {
        self.strides[index]
    }

    /// Rows in plane `index`.
    pub fn plane_height(&self, index: usize) -> usize {
        if index == 0 {
            self.resolution.height as usize
        } else {
            chroma_size(self.resolution).1
        }
    }

    pub fn sample(&self, index: usize, x: usize, y: usize) -> u8 {
        self.planes[index][y * self.strides[index] + x]
    }

    /// Mutable access to the Y, U and V planes at once.
    pub fn planes_mut(&mut self) -> (&mut [u8], &mut [u8], &mut [u8]) {
        let [y, u, v] = &mut self.planes;
        (y.as_mut_slice(), u.as_mut_slice(), v.as_mut_slice())
    }
}

fn chroma_size(resolution: Resolution) -> (usize, usize) {
    (
        (resolution.width as usize).div_ceil(2),
        (resolution.height as usize).div_ceil(2),
    )
}

// MARK: - EncodedPacket

/// One compressed access unit produced by an encoder.
#[derive(Debug, Clone)]
pub struct EncodedPacket {
    pub data: bytes::Bytes,
    /// Presentation timestamp in time-base ticks, when the encoder reports one.
    pub pts: Option<i64>,
    pub is_keyframe: bool,
}

impl EncodedPacket {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// MARK: - DecodedFrame

/// Luma plane of a decoded picture.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub data: bytes::Bytes,
    pub width: u32,
    pub height: u32,
    /// Bytes per row in `data`, at least `width`.
    pub stride: usize,
    pub format: PixelFormat,
}
