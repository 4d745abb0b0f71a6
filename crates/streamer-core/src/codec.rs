//! Seams between the session loops and a codec backend.

use crate::errors::CodecError;
use crate::types::{CodecId, DecodedFrame, EncodedPacket, Yuv420Frame};

/// A synchronous video encoder.
///
/// Each call yields zero or one packet. Passing `None` means "no more input":
/// the encoder then hands back the frames it is still holding, one per call,
/// and returns `Ok(None)` once nothing is left.
pub trait VideoEncoder {
    fn codec(&self) -> CodecId;

    fn encode(&mut self, frame: Option<&Yuv420Frame>) -> Result<Option<EncodedPacket>, CodecError>;
}

/// Result of feeding bytes to a [`VideoDecoder`].
#[derive(Debug)]
pub struct DecodeStep {
    /// Bytes of the input the decoder took.
    pub consumed: usize,
    /// Pictures completed by this call, in display order.
    pub frames: Vec<DecodedFrame>,
}

/// A synchronous, stream-based video decoder.
pub trait VideoDecoder {
    /// Feed compressed bytes. The decoder may consume fewer than given and
    /// returns every picture that became available.
    fn decode(&mut self, data: &[u8]) -> Result<DecodeStep, CodecError>;

    /// Signal end of input and return every frame still held back. Called
    /// once; later `decode` or `flush` calls are errors.
    fn flush(&mut self) -> Result<Vec<DecodedFrame>, CodecError>;
}
