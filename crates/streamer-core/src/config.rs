use serde::{Deserialize, Serialize};

use crate::errors::StreamerError;
use crate::types::{CodecId, PixelFormat, Rational, Resolution};

/// Tuning parameters for one encode session.
///
/// The defaults are the compiled-in desktop recording profile: 1080p at
/// 25 fps, 1.2 Mbit/s, an intra frame every ten frames, one B-frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderProfile {
    pub codec: CodecId,
    pub resolution: Resolution,
    pub bitrate_bps: u64,
    pub time_base: Rational,
    /// Emit one intra frame every `gop_size` frames.
    pub gop_size: u32,
    /// Minimum GOP size.
    pub keyint_min: u32,
    /// Maximum number of B-frames between non-B-frames.
    pub max_b_frames: u32,
    /// qscale factor between P and I frames.
    pub i_quant_factor: f32,
    pub qcompress: f32,
    pub qmin: u32,
    pub qmax: u32,
    /// Maximum quantizer difference between frames.
    pub max_qdiff: u32,
    /// Reference frames.
    pub refs: u32,
    /// Trellis RD quantization.
    pub trellis: bool,
    /// Encoder speed preset (H.264 only).
    pub preset: Option<String>,
    pub pixel_format: PixelFormat,
    /// Frames captured and encoded per session.
    pub frame_count: u32,
}

impl Default for EncoderProfile {
    fn default() -> Self {
        Self {
            codec: CodecId::H264,
            resolution: Resolution::FHD,
            bitrate_bps: 1_200_000,
            time_base: Rational::new(1, 25),
            gop_size: 10,
            keyint_min: 1,
            max_b_frames: 1,
            i_quant_factor: 0.71,
            qcompress: 0.6,
            qmin: 20,
            qmax: 51,
            max_qdiff: 4,
            refs: 4,
            trellis: true,
            preset: Some("slow".to_owned()),
            pixel_format: PixelFormat::I420,
            // 10 seconds at 25 fps
            frame_count: 250,
        }
    }
}

impl EncoderProfile {
    /// Frames per second, rounded down (time base 1/25 → 25).
    pub fn fps(&self) -> u32 {
        if self.time_base.num == 0 {
            0
        } else {
            self.time_base.den / self.time_base.num
        }
    }

    pub fn bitrate_kbps(&self) -> u32 {
        (self.bitrate_bps / 1000) as u32
    }

    /// Check the profile can be opened by an encoder.
    pub fn validate(&self) -> Result<(), StreamerError> {
        let invalid = |reason: String| Err(StreamerError::ConfigurationInvalid { reason });

        if self.resolution.is_empty() {
            return invalid(format!("resolution {} has a zero dimension", self.resolution));
        }
        if !self.resolution.is_even() {
            return invalid(format!(
                "resolution {} must be a multiple of two in each dimension",
                self.resolution
            ));
        }
        if self.time_base.num == 0 || self.time_base.den == 0 {
            return invalid(format!("time base {} is degenerate", self.time_base));
        }
        if self.qmin > self.qmax {
            return invalid(format!("qmin {} exceeds qmax {}", self.qmin, self.qmax));
        }
        if self.pixel_format != PixelFormat::I420 {
            return invalid(format!("pixel format {:?} is not supported by the encoder", self.pixel_format));
        }
        Ok(())
    }
}
