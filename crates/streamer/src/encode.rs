//! Capture → convert → encode → write loop.
//!
//! ```text
//! Init     open encoder, open output, build converter + one I420 frame
//! Steady   frame_count × { capture, convert, pts = index, encode, write packet? }
//! Drain    encode(None) until the encoder has nothing left
//! Finalize append the end-of-stream marker, flush, release
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use streamer_capture::ScreenSource;
use streamer_codec::CodecRegistry;
use streamer_core::{EncodedPacket, EncoderProfile, StreamerError, VideoEncoder, Yuv420Frame};
use tracing::{debug, info};

use crate::convert::FrameConverter;

/// Default output of the demo session.
pub const OUTPUT_FILE: &str = "test.h264";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodeSummary {
    pub frames_submitted: u32,
    pub packets_written:  u32,
    /// Packets recovered in the drain phase.
    pub delayed_packets:  u32,
    /// Total bytes written, including the end-of-stream marker.
    pub bytes_written:    u64,
}

fn write_packet<W: Write + ?Sized>(
    output: &mut W,
    packet: &EncodedPacket,
    index: u32,
    summary: &mut EncodeSummary,
) -> Result<(), StreamerError> {
    debug!("Write frame {:3} (size={:5})", index, packet.len());
    output.write_all(&packet.data)?;
    summary.packets_written += 1;
    summary.bytes_written += packet.len() as u64;
    Ok(())
}

/// Drive one encode session over an already opened encoder and output.
///
/// Frames get PTS `0..frame_count` in capture order. The converter and the
/// destination frame are reused for every frame.
pub fn run_encode<S, E, W>(
    source: &mut S,
    converter: &FrameConverter,
    encoder: &mut E,
    output: &mut W,
    frame_count: u32,
) -> Result<EncodeSummary, StreamerError>
where
    S: ScreenSource + ?Sized,
    E: VideoEncoder + ?Sized,
    W: Write + ?Sized,
{
    let mut frame = Yuv420Frame::new(converter.destination());
    let mut summary = EncodeSummary::default();

    for index in 0..frame_count {
        let bitmap = source.capture()?;
        converter.convert(&bitmap, &mut frame)?;
        drop(bitmap);

        frame.pts = index as i64;
        let packet = encoder.encode(Some(&frame))?;
        summary.frames_submitted += 1;
        if let Some(packet) = packet {
            write_packet(output, &packet, index, &mut summary)?;
        }
    }

    // Delayed frames (B-frame reordering, lookahead).
    let mut index = frame_count;
    while let Some(packet) = encoder.encode(None)? {
        write_packet(output, &packet, index, &mut summary)?;
        summary.delayed_packets += 1;
        index += 1;
    }

    let marker = encoder.codec().end_of_stream_marker();
    output.write_all(marker)?;
    output.flush()?;
    summary.bytes_written += marker.len() as u64;

    Ok(summary)
}

/// Encode `profile.frame_count` frames from `source` with `encoder` into `path`.
pub fn encode_file<S, E>(
    source: &mut S,
    encoder: &mut E,
    profile: &EncoderProfile,
    path: &Path,
) -> Result<EncodeSummary, StreamerError>
where
    S: ScreenSource + ?Sized,
    E: VideoEncoder + ?Sized,
{
    let file = File::create(path)
        .map_err(|source| StreamerError::OpenFile { path: path.to_path_buf(), source })?;
    let mut output = BufWriter::new(file);
    let converter = FrameConverter::new(source.resolution(), profile.resolution)?;

    let summary = run_encode(source, &converter, encoder, &mut output, profile.frame_count)?;
    info!(
        "Encoded {} frames into {} packets ({} delayed), {} bytes → {}",
        summary.frames_submitted,
        summary.packets_written,
        summary.delayed_packets,
        summary.bytes_written,
        path.display()
    );
    Ok(summary)
}

/// Open the best encoder for `profile` and encode into `path`.
pub fn encode_to_file<S: ScreenSource + ?Sized>(
    registry: &CodecRegistry,
    profile: &EncoderProfile,
    path: &Path,
    source: &mut S,
) -> Result<EncodeSummary, StreamerError> {
    info!("Encode video file {}", path.display());
    profile.validate()?;
    let mut encoder = registry.open_encoder(profile)?;
    encode_file(source, &mut encoder, profile, path)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use bytes::Bytes;
    use streamer_core::{
        CaptureError, CapturedBitmap, CodecError, CodecId, Resolution, SEQUENCE_END_CODE,
    };

    use super::*;
    use crate::convert::{bgra_luma, BitmapView};

    /// Encoder that holds `delay` frames back, like B-frame lookahead.
    struct DelayEncoder {
        delay:             usize,
        queue:             VecDeque<i64>,
        submitted:         Vec<i64>,
        luma_samples:      Vec<u8>,
        drain_calls:       u32,
        fail_at:           Option<i64>,
        frame_after_drain: bool,
    }

    impl DelayEncoder {
        fn new(delay: usize) -> Self {
            Self {
                delay,
                queue: VecDeque::new(),
                submitted: Vec::new(),
                luma_samples: Vec::new(),
                drain_calls: 0,
                fail_at: None,
                frame_after_drain: false,
            }
        }

        fn packet(pts: i64) -> EncodedPacket {
            EncodedPacket {
                data: Bytes::from(format!("<{pts}>").into_bytes()),
                pts: Some(pts),
                is_keyframe: pts == 0,
            }
        }
    }

    impl VideoEncoder for DelayEncoder {
        fn codec(&self) -> CodecId {
            CodecId::H264
        }

        fn encode(&mut self, frame: Option<&Yuv420Frame>) -> Result<Option<EncodedPacket>, CodecError> {
            match frame {
                Some(frame) => {
                    if self.drain_calls > 0 {
                        self.frame_after_drain = true;
                    }
                    if self.fail_at == Some(frame.pts) {
                        return Err(CodecError::EncodeFailed { frame: frame.pts, reason: "boom".into() });
                    }
                    self.submitted.push(frame.pts);
                    self.luma_samples.push(frame.sample(0, 0, 0));
                    self.queue.push_back(frame.pts);
                    if self.queue.len() > self.delay {
                        Ok(self.queue.pop_front().map(Self::packet))
                    } else {
                        Ok(None)
                    }
                }
                None => {
                    self.drain_calls += 1;
                    Ok(self.queue.pop_front().map(Self::packet))
                }
            }
        }
    }

    /// Serves the given bitmaps in order, then fails.
    struct Sequence(VecDeque<CapturedBitmap>, Resolution);

    impl Sequence {
        fn solid(res: Resolution, colours: &[[u8; 4]]) -> Self {
            let bitmaps = colours
                .iter()
                .map(|c| CapturedBitmap::solid(res.width, res.height, *c))
                .collect();
            Self(bitmaps, res)
        }
    }

    impl ScreenSource for Sequence {
        fn resolution(&self) -> Resolution {
            self.1
        }

        fn capture(&mut self) -> Result<CapturedBitmap, CaptureError> {
            self.0
                .pop_front()
                .ok_or(CaptureError::Platform { call: "capture", reason: "sequence exhausted".into() })
        }
    }

    fn grey_frames(n: usize) -> Sequence {
        let colours: Vec<[u8; 4]> = (0..n).map(|i| [i as u8 * 10, i as u8 * 10, i as u8 * 10, 255]).collect();
        Sequence::solid(Resolution::new(16, 16), &colours)
    }

    fn converter(res: Resolution) -> FrameConverter {
        FrameConverter::new(res, res).unwrap()
    }

    #[test]
    fn submits_consecutive_pts_before_drain() {
        let mut source = grey_frames(6);
        let mut encoder = DelayEncoder::new(2);
        let mut out = Vec::new();

        let summary = run_encode(&mut source, &converter(Resolution::new(16, 16)), &mut encoder, &mut out, 6).unwrap();

        assert_eq!(encoder.submitted, vec![0, 1, 2, 3, 4, 5]);
        assert!(!encoder.frame_after_drain);
        assert_eq!(summary.frames_submitted, 6);
    }

    #[test]
    fn drain_recovers_every_delayed_packet() {
        let mut source = grey_frames(5);
        let mut encoder = DelayEncoder::new(3);
        let mut out = Vec::new();

        let summary = run_encode(&mut source, &converter(Resolution::new(16, 16)), &mut encoder, &mut out, 5).unwrap();

        assert_eq!(summary.packets_written, 5);
        assert_eq!(summary.delayed_packets, 3);
        // Three packets drained plus the final empty call.
        assert_eq!(encoder.drain_calls, 4);
        assert_eq!(out, b"<0><1><2><3><4>\x00\x00\x01\xb7".to_vec());
        assert_eq!(summary.bytes_written, out.len() as u64);
    }

    #[test]
    fn output_ends_with_sequence_end_code() {
        for frames in [0usize, 1, 7] {
            let mut source = grey_frames(frames);
            let mut encoder = DelayEncoder::new(1);
            let mut out = Vec::new();
            run_encode(&mut source, &converter(Resolution::new(16, 16)), &mut encoder, &mut out, frames as u32).unwrap();
            assert_eq!(&out[out.len() - 4..], &SEQUENCE_END_CODE);
        }
    }

    #[test]
    fn encode_failure_aborts_the_session() {
        let mut source = grey_frames(4);
        let mut encoder = DelayEncoder::new(0);
        encoder.fail_at = Some(2);
        let mut out = Vec::new();

        let err = run_encode(&mut source, &converter(Resolution::new(16, 16)), &mut encoder, &mut out, 4).unwrap_err();

        assert!(matches!(err, StreamerError::Codec(CodecError::EncodeFailed { frame: 2, .. })));
        assert_eq!(encoder.drain_calls, 0);
        assert!(!out.ends_with(&SEQUENCE_END_CODE));
    }

    #[test]
    fn capture_failure_is_reported() {
        let mut source = grey_frames(1);
        let mut encoder = DelayEncoder::new(0);
        let err = run_encode(&mut source, &converter(Resolution::new(16, 16)), &mut encoder, &mut Vec::new(), 2).unwrap_err();
        assert!(matches!(err, StreamerError::Capture(_)));
    }

    #[test]
    fn rgb_frames_reach_the_encoder_upright() {
        let res = Resolution::new(64, 64);
        let colours = [[0x00, 0x00, 0xFF, 0xFF], [0x00, 0xFF, 0x00, 0xFF], [0xFF, 0x00, 0x00, 0xFF]];
        let mut source = Sequence::solid(res, &colours);
        let mut encoder = DelayEncoder::new(1);

        run_encode(&mut source, &converter(res), &mut encoder, &mut Vec::new(), 3).unwrap();

        let expected: Vec<u8> = colours
            .iter()
            .map(|c| {
                let bitmap = CapturedBitmap::solid(64, 64, *c);
                bgra_luma(BitmapView::new(&bitmap).unwrap().pixel(0, 63))
            })
            .collect();
        assert_eq!(encoder.luma_samples, expected);
        assert_eq!(encoder.luma_samples, vec![82, 144, 41]);
    }

    #[test]
    fn runs_against_a_trait_object_writer() {
        let mut source = grey_frames(2);
        let mut encoder = DelayEncoder::new(0);
        let mut buf = Vec::new();
        let output: &mut dyn Write = &mut buf;

        let summary = run_encode(&mut source, &converter(Resolution::new(16, 16)), &mut encoder, output, 2).unwrap();

        assert_eq!(summary.packets_written, 2);
        assert_eq!(buf, b"<0><1>\x00\x00\x01\xb7".to_vec());
    }

    #[test]
    fn odd_profile_is_rejected_before_any_codec_is_opened() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.h264");
        let registry = CodecRegistry::probe(|_| false);
        let profile = EncoderProfile { resolution: Resolution::new(15, 16), ..Default::default() };

        let err = encode_to_file(&registry, &profile, &path, &mut grey_frames(1)).unwrap_err();

        assert!(matches!(err, StreamerError::ConfigurationInvalid { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn encode_file_writes_stream_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.h264");
        let profile = EncoderProfile {
            resolution: Resolution::new(16, 16),
            frame_count: 3,
            ..Default::default()
        };
        let mut source = grey_frames(3);
        let mut encoder = DelayEncoder::new(1);

        let summary = encode_file(&mut source, &mut encoder, &profile, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len() as u64, summary.bytes_written);
        assert!(bytes.starts_with(b"<0><1><2>"));
        assert!(bytes.ends_with(&SEQUENCE_END_CODE));
    }

    #[test]
    fn unwritable_output_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.h264");
        let profile = EncoderProfile { resolution: Resolution::new(16, 16), frame_count: 1, ..Default::default() };

        let err = encode_file(&mut grey_frames(1), &mut DelayEncoder::new(0), &profile, &path).unwrap_err();
        assert!(matches!(err, StreamerError::OpenFile { .. }));
    }
}
