pub mod codec;
pub mod config;
pub mod errors;
pub mod types;

pub use codec::{DecodeStep, VideoDecoder, VideoEncoder};
pub use config::EncoderProfile;
pub use errors::{CaptureError, CodecError, CodecRole, ConvertError, StreamerError};
pub use types::*;
