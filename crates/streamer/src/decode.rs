//! Elementary stream → still images.
//!
//! The input is read in fixed 4096-byte chunks. Each chunk is fed to the
//! decoder until it has consumed all of it; every complete picture goes to
//! the frame sink. After end of file the decoder is flushed exactly once to
//! recover the frames it still holds (I/P latency, reordering).

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use streamer_codec::CodecRegistry;
use streamer_core::{CodecError, CodecId, DecodedFrame, StreamerError, VideoDecoder};
use tracing::info;

use crate::raster;

pub const INBUF_SIZE: usize = 4096;
/// Zeroed bytes kept after the valid part of the input buffer.
pub const INPUT_PADDING: usize = 64;

/// Output filename template; `{}` is replaced by the frame number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPattern(String);

impl OutputPattern {
    pub const PLACEHOLDER: &'static str = "{}";

    pub fn new(pattern: impl Into<String>) -> Result<Self, StreamerError> {
        let pattern = pattern.into();
        if !pattern.contains(Self::PLACEHOLDER) {
            return Err(StreamerError::ConfigurationInvalid {
                reason: format!("output pattern '{pattern}' has no {{}} placeholder"),
            });
        }
        Ok(Self(pattern))
    }

    pub fn path_for(&self, index: u32) -> PathBuf {
        PathBuf::from(self.0.replacen(Self::PLACEHOLDER, &index.to_string(), 1))
    }
}

impl std::fmt::Display for OutputPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fill `buf` from `input`, stopping early only at end of file.
fn read_chunk<R: Read + ?Sized>(input: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Decode everything in `input`, calling `on_frame(frame, index, last)` for
/// each picture. `last` is true for frames recovered by the final flush.
///
/// Returns the number of frames produced.
pub fn run_decode<R, D, F>(input: &mut R, decoder: &mut D, mut on_frame: F) -> Result<u32, StreamerError>
where
    R: Read + ?Sized,
    D: VideoDecoder + ?Sized,
    F: FnMut(&DecodedFrame, u32, bool) -> Result<(), StreamerError>,
{
    let mut inbuf = vec![0u8; INBUF_SIZE + INPUT_PADDING];
    let mut frame_count = 0u32;

    loop {
        let size = read_chunk(input, &mut inbuf[..INBUF_SIZE])?;
        if size == 0 {
            break;
        }
        inbuf[size..size + INPUT_PADDING].fill(0);

        let mut cursor = 0;
        while cursor < size {
            let step = decoder.decode(&inbuf[cursor..size])?;
            if step.consumed == 0 && step.frames.is_empty() {
                return Err(CodecError::DecodeFailed {
                    frame: frame_count,
                    reason: "decoder consumed no input".into(),
                }
                .into());
            }
            for frame in &step.frames {
                on_frame(frame, frame_count, false)?;
                frame_count += 1;
            }
            cursor += step.consumed.min(size - cursor);
        }
    }

    for frame in decoder.flush()? {
        on_frame(&frame, frame_count, true)?;
        frame_count += 1;
    }
    Ok(frame_count)
}

/// Decode the file at `input` with `decoder`, writing one PGM per frame.
pub fn decode_file<D: VideoDecoder + ?Sized>(
    decoder: &mut D,
    input: &Path,
    pattern: &OutputPattern,
) -> Result<u32, StreamerError> {
    info!("Decode video file {} to {}", input.display(), pattern);
    let mut file = File::open(input)
        .map_err(|source| StreamerError::OpenFile { path: input.to_path_buf(), source })?;

    let frames = run_decode(&mut file, decoder, |frame, index, last| {
        info!("Saving {}frame {:3}", if last { "last " } else { "" }, index);
        raster::save_pgm(&pattern.path_for(index), frame)
    })?;
    info!("Decoded {} frames from {}", frames, input.display());
    Ok(frames)
}

/// Open the best decoder for `codec` and decode `input` into images.
pub fn decode_to_images(
    registry: &CodecRegistry,
    codec: CodecId,
    input: &Path,
    pattern: &OutputPattern,
) -> Result<u32, StreamerError> {
    let mut decoder = registry.open_decoder(codec)?;
    decode_file(&mut decoder, input, pattern)
}
