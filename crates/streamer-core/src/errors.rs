use std::path::PathBuf;

use thiserror::Error;

use crate::types::{CodecId, Resolution};

#[derive(Error, Debug)]
pub enum StreamerError {
    #[error("Configuration invalid: {reason}")]
    ConfigurationInvalid { reason: String },

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Could not open {}: {source}", .path.display())]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("{call} failed: {reason}")]
    Platform { call: &'static str, reason: String },

    #[error("Capture resolution {0} is invalid")]
    InvalidResolution(Resolution),

    #[error("Bitmap buffer holds {actual} bytes, expected {expected}")]
    BufferMismatch { expected: usize, actual: usize },
}

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Conversion context rejected {src} → {dst}")]
    InvalidContext { src: Resolution, dst: Resolution },

    #[error("Source bitmap is {actual}, converter expects {expected}")]
    SourceMismatch { expected: Resolution, actual: Resolution },

    #[error("Destination frame is {actual}, converter expects {expected}")]
    DestinationMismatch { expected: Resolution, actual: Resolution },

    #[error("Source bitmap buffer too small: {actual} bytes, need {expected}")]
    BufferTooSmall { expected: usize, actual: usize },
}

/// Which side of a codec a lookup was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecRole {
    Encoder,
    Decoder,
}

impl std::fmt::Display for CodecRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encoder => write!(f, "encoder"),
            Self::Decoder => write!(f, "decoder"),
        }
    }
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("No {role} available for {codec}")]
    NotFound { codec: CodecId, role: CodecRole },

    #[error("GStreamer initialisation failed: {0}")]
    Init(String),

    #[error("GStreamer pipeline error: {0}")]
    GStreamerPipeline(String),

    #[error("Error encoding frame {frame}: {reason}")]
    EncodeFailed { frame: i64, reason: String },

    #[error("Error while decoding frame {frame}: {reason}")]
    DecodeFailed { frame: u32, reason: String },
}
