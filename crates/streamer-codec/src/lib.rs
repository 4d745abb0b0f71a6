//! streamer-codec — codec lookup and GStreamer encode/decode backends.
//!
//! # Encoder priority (H.264, first available wins)
//! 1. `x264enc`   — software x264; every profile field maps to a property
//! 2. `mfh264enc` — Windows Media Foundation
//! 3. `nvh264enc` — NVIDIA NVENC
//!
//! # Decoder priority (H.264)
//! 1. `avdec_h264` — software libavcodec
//! 2. `d3d11h264dec`, `nvh264dec`, `vaapih264dec` — hardware
//!
//! Both backends implement the synchronous `VideoEncoder` / `VideoDecoder`
//! traits from `streamer-core`; callers that run inside an async runtime
//! should drive them from `tokio::task::spawn_blocking`.

mod decoder;
mod encoder;
mod pipeline;
pub mod registry;

pub use decoder::GstDecoder;
pub use encoder::{encoder_properties, GstEncoder};
pub use registry::{CodecRegistry, ElementCandidate};
