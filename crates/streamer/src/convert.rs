//! BGRA bitmap → I420 conversion.
//!
//! A [`FrameConverter`] is the conversion context: it is built once for a
//! fixed source and destination size, precomputes the sampling maps, and is
//! then applied to every captured bitmap of the session. Resampling is point
//! sampling (fast, not bilinear-accurate). Luma/chroma use the BT.601
//! limited-range integer matrix.

use streamer_core::{CapturedBitmap, ConvertError, Resolution, Yuv420Frame};

const BPP: usize = CapturedBitmap::BYTES_PER_PIXEL;

// ── BitmapView ────────────────────────────────────────────────────────────────

/// Rows of a BGRA bitmap addressed through an origin offset and a signed stride.
#[derive(Debug, Clone, Copy)]
pub struct BitmapView<'a> {
    data:   &'a [u8],
    origin: usize,
    stride: isize,
    width:  u32,
    height: u32,
}

impl<'a> BitmapView<'a> {
    pub fn new(bitmap: &'a CapturedBitmap) -> Result<Self, ConvertError> {
        let row_bytes = bitmap.width as usize * BPP;
        let needed = match bitmap.height as usize {
            0 => 0,
            h => bitmap.stride * (h - 1) + row_bytes,
        };
        if bitmap.data.len() < needed || bitmap.stride < row_bytes {
            return Err(ConvertError::BufferTooSmall { expected: needed, actual: bitmap.data.len() });
        }
        Ok(Self {
            data: &bitmap.data,
            origin: 0,
            stride: bitmap.stride as isize,
            width: bitmap.width,
            height: bitmap.height,
        })
    }

    /// Vertical flip without copying: the last row becomes the origin and the
    /// stride changes sign.
    pub fn flipped(self) -> Self {
        if self.height == 0 {
            return self;
        }
        let last = self.origin as isize + self.stride * (self.height as isize - 1);
        Self { origin: last as usize, stride: -self.stride, ..self }
    }

    pub fn stride(&self) -> isize {
        self.stride
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn row(&self, y: u32) -> &'a [u8] {
        let start = (self.origin as isize + y as isize * self.stride) as usize;
        &self.data[start..start + self.width as usize * BPP]
    }

    /// BGRA at `(x, y)` in view coordinates.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let row = self.row(y);
        let i = x as usize * BPP;
        [row[i], row[i + 1], row[i + 2], row[i + 3]]
    }
}

// ── Colour math ───────────────────────────────────────────────────────────────

fn luma(r: i32, g: i32, b: i32) -> u8 {
    (((66 * r + 129 * g + 25 * b + 128) >> 8) + 16).clamp(0, 255) as u8
}

fn chroma(r: i32, g: i32, b: i32) -> (u8, u8) {
    let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
    let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
    (u.clamp(0, 255) as u8, v.clamp(0, 255) as u8)
}

/// Limited-range luma of a BGRA pixel.
pub fn bgra_luma(pixel: [u8; 4]) -> u8 {
    luma(pixel[2] as i32, pixel[1] as i32, pixel[0] as i32)
}

// ── FrameConverter ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FrameConverter {
    src:   Resolution,
    dst:   Resolution,
    /// Source column sampled for each destination column.
    x_map: Vec<u32>,
    /// Source row sampled for each destination row.
    y_map: Vec<u32>,
}

fn sample_map(src: u32, dst: u32) -> Vec<u32> {
    (0..dst as u64)
        .map(|d| (((2 * d + 1) * src as u64) / (2 * dst as u64)) as u32)
        .collect()
}

impl FrameConverter {
    pub fn new(src: Resolution, dst: Resolution) -> Result<Self, ConvertError> {
        if src.is_empty() || dst.is_empty() {
            return Err(ConvertError::InvalidContext { src, dst });
        }
        tracing::debug!("Conversion context BGRA {} → I420 {}", src, dst);
        Ok(Self {
            src,
            dst,
            x_map: sample_map(src.width, dst.width),
            y_map: sample_map(src.height, dst.height),
        })
    }

    pub fn destination(&self) -> Resolution {
        self.dst
    }

    /// Flip `bitmap` upright and convert it into `out` in place.
    pub fn convert(&self, bitmap: &CapturedBitmap, out: &mut Yuv420Frame) -> Result<(), ConvertError> {
        if bitmap.resolution() != self.src {
            return Err(ConvertError::SourceMismatch { expected: self.src, actual: bitmap.resolution() });
        }
        let view = BitmapView::new(bitmap)?.flipped();
        self.convert_view(&view, out)
    }

    /// Convert an already-oriented view into `out`.
    pub fn convert_view(&self, view: &BitmapView<'_>, out: &mut Yuv420Frame) -> Result<(), ConvertError> {
        if view.resolution() != self.src {
            return Err(ConvertError::SourceMismatch { expected: self.src, actual: view.resolution() });
        }
        if out.resolution() != self.dst {
            return Err(ConvertError::DestinationMismatch { expected: self.dst, actual: out.resolution() });
        }
        let (dw, dh) = (self.dst.width as usize, self.dst.height as usize);
        let y_stride = out.stride(0);
        let c_stride = out.stride(1);
        let (y_plane, u_plane, v_plane) = out.planes_mut();

        for (dy, &sy) in self.y_map.iter().enumerate() {
            let row = view.row(sy);
            let dst_row = &mut y_plane[dy * y_stride..dy * y_stride + dw];
            for (dx, &sx) in self.x_map.iter().enumerate() {
                let i = sx as usize * BPP;
                dst_row[dx] = luma(row[i + 2] as i32, row[i + 1] as i32, row[i] as i32);
            }
        }

        // Chroma: average the (up to) 2×2 sampled pixels under each chroma sample.
        for cy in 0..dh.div_ceil(2) {
            for cx in 0..dw.div_ceil(2) {
                let (mut r, mut g, mut b, mut n) = (0i32, 0i32, 0i32, 0i32);
                for dy in (2 * cy)..(2 * cy + 2).min(dh) {
                    let row = view.row(self.y_map[dy]);
                    for dx in (2 * cx)..(2 * cx + 2).min(dw) {
                        let i = self.x_map[dx] as usize * BPP;
                        b += row[i] as i32;
                        g += row[i + 1] as i32;
                        r += row[i + 2] as i32;
                        n += 1;
                    }
                }
                let (u, v) = chroma(r / n, g / n, b / n);
                u_plane[cy * c_stride + cx] = u;
                v_plane[cy * c_stride + cx] = v;
            }
        }
        Ok(())
    }
}
