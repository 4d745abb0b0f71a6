//! Codec lookup by identifier.
//!
//! The registry is built once at startup from a probe saying which GStreamer
//! element factories exist, then passed by reference to whoever needs to
//! open an encoder or decoder.

use std::collections::HashMap;

use gstreamer as gst;
use streamer_core::{CodecError, CodecId, CodecRole, EncoderProfile};
use tracing::{info, warn};

use crate::{GstDecoder, GstEncoder};

/// A GStreamer element able to encode or decode one codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementCandidate {
    pub factory: &'static str,
    pub label:   &'static str,
}

const fn candidate(factory: &'static str, label: &'static str) -> ElementCandidate {
    ElementCandidate { factory, label }
}

/// Encoder candidates in priority order.
static H264_ENCODERS: &[ElementCandidate] = &[
    candidate("x264enc",   "Software x264 (honours the full tuning profile)"),
    candidate("mfh264enc", "Windows Media Foundation"),
    candidate("nvh264enc", "NVIDIA NVENC"),
];

static H264_DECODERS: &[ElementCandidate] = &[
    candidate("avdec_h264",   "Software libavcodec"),
    candidate("d3d11h264dec", "Direct3D 11 DXVA"),
    candidate("nvh264dec",    "NVIDIA NVDEC"),
    candidate("vaapih264dec", "VA-API"),
];

static MPEG1_ENCODERS: &[ElementCandidate] = &[
    candidate("avenc_mpeg1video", "Software libavcodec"),
];

static MPEG1_DECODERS: &[ElementCandidate] = &[
    candidate("avdec_mpeg1video", "Software libavcodec"),
    candidate("mpeg2dec",         "libmpeg2"),
];

const ALL_CODECS: [CodecId; 2] = [CodecId::H264, CodecId::Mpeg1Video];

fn catalog(codec: CodecId, role: CodecRole) -> &'static [ElementCandidate] {
    match (codec, role) {
        (CodecId::H264, CodecRole::Encoder) => H264_ENCODERS,
        (CodecId::H264, CodecRole::Decoder) => H264_DECODERS,
        (CodecId::Mpeg1Video, CodecRole::Encoder) => MPEG1_ENCODERS,
        (CodecId::Mpeg1Video, CodecRole::Decoder) => MPEG1_DECODERS,
    }
}

/// Parser element and caps of a codec's elementary stream.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Bitstream {
    pub parser: &'static str,
    /// Caps the encoder output is constrained to.
    pub output_caps: &'static str,
    /// Caps announced on raw elementary-stream input.
    pub input_caps: &'static str,
}

pub(crate) fn bitstream(codec: CodecId) -> Bitstream {
    match codec {
        CodecId::H264 => Bitstream {
            parser:      "h264parse",
            output_caps: "video/x-h264,stream-format=byte-stream,alignment=au",
            input_caps:  "video/x-h264,stream-format=byte-stream",
        },
        CodecId::Mpeg1Video => Bitstream {
            parser:      "mpegvideoparse",
            output_caps: "video/mpeg,mpegversion=1,systemstream=false",
            input_caps:  "video/mpeg,mpegversion=1,systemstream=false",
        },
    }
}

// ── CodecRegistry ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct CodecRegistry {
    available: HashMap<(CodecId, CodecRole), Vec<ElementCandidate>>,
}

impl CodecRegistry {
    /// Keep every catalogued element for which `exists(factory)` is true.
    pub fn probe(exists: impl Fn(&str) -> bool) -> Self {
        let mut available = HashMap::new();
        for codec in ALL_CODECS {
            for role in [CodecRole::Encoder, CodecRole::Decoder] {
                let found: Vec<ElementCandidate> = catalog(codec, role)
                    .iter()
                    .filter(|c| {
                        let present = exists(c.factory);
                        if !present {
                            warn!("{} {} '{}' not found", codec, role, c.factory);
                        }
                        present
                    })
                    .copied()
                    .collect();
                available.insert((codec, role), found);
            }
        }
        Self { available }
    }

    /// Initialise GStreamer and probe its plugin registry.
    pub fn gstreamer() -> Result<Self, CodecError> {
        gst::init().map_err(|e| CodecError::Init(e.to_string()))?;
        Ok(Self::probe(|name| gst::ElementFactory::find(name).is_some()))
    }

    fn find(&self, codec: CodecId, role: CodecRole) -> Result<ElementCandidate, CodecError> {
        let element = self
            .available
            .get(&(codec, role))
            .and_then(|list| list.first().copied())
            .ok_or(CodecError::NotFound { codec, role })?;
        info!("Selected {} {}: {} ({})", codec, role, element.factory, element.label);
        Ok(element)
    }

    pub fn find_encoder(&self, codec: CodecId) -> Result<ElementCandidate, CodecError> {
        self.find(codec, CodecRole::Encoder)
    }

    pub fn find_decoder(&self, codec: CodecId) -> Result<ElementCandidate, CodecError> {
        self.find(codec, CodecRole::Decoder)
    }

    /// Open the best available encoder for `profile.codec`.
    pub fn open_encoder(&self, profile: &EncoderProfile) -> Result<GstEncoder, CodecError> {
        let element = self.find_encoder(profile.codec)?;
        GstEncoder::open(element, profile)
    }

    pub fn open_decoder(&self, codec: CodecId) -> Result<GstDecoder, CodecError> {
        let element = self.find_decoder(codec)?;
        GstDecoder::open(element, codec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highest_priority_available_element_wins() {
        let registry = CodecRegistry::probe(|name| name == "nvh264enc" || name == "mfh264enc");
        let encoder = registry.find_encoder(CodecId::H264).unwrap();
        assert_eq!(encoder.factory, "mfh264enc");
    }

    #[test]
    fn missing_codec_reports_not_found() {
        let registry = CodecRegistry::probe(|name| name == "x264enc");
        let err = registry.find_decoder(CodecId::H264).unwrap_err();
        assert!(matches!(
            err,
            CodecError::NotFound { codec: CodecId::H264, role: CodecRole::Decoder }
        ));
        assert!(registry.find_encoder(CodecId::Mpeg1Video).is_err());
    }

    #[test]
    fn lookups_are_independent_per_codec() {
        let registry = CodecRegistry::probe(|name| name.starts_with("avdec_"));
        assert_eq!(registry.find_decoder(CodecId::H264).unwrap().factory, "avdec_h264");
        assert_eq!(
            registry.find_decoder(CodecId::Mpeg1Video).unwrap().factory,
            "avdec_mpeg1video"
        );
    }

    #[test]
    fn default_registry_is_empty() {
        let registry = CodecRegistry::default();
        assert!(registry.find_encoder(CodecId::H264).is_err());
    }
}
