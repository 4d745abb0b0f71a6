//! GStreamer decode pipeline for raw elementary streams.
//!
//! # Pipeline
//! ```text
//! appsrc (ES caps) → h264parse / mpegvideoparse → [decoder] → videoconvert
//!   → video/x-raw,format=GRAY8 → appsink
//! ```
//! Input arrives in arbitrary chunks; the parser reassembles access units.

use std::str::FromStr;

use bytes::Bytes;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_video as gst_video;
use streamer_core::{CodecError, CodecId, DecodeStep, DecodedFrame, PixelFormat, VideoDecoder};
use tracing::{debug, info};

use crate::pipeline::{AppPipeline, DRAIN_TIMEOUT};
use crate::registry::{bitstream, ElementCandidate};

/// Synchronous decoder backed by a GStreamer pipeline.
pub struct GstDecoder {
    pipeline: AppPipeline,
    element:  &'static str,
    /// Frames handed out so far.
    decoded:  u32,
    flushed:  bool,
}

impl GstDecoder {
    /// Build and start the pipeline. Requires GStreamer to be initialised.
    pub fn open(element: ElementCandidate, codec: CodecId) -> Result<Self, CodecError> {
        let stream = bitstream(codec);
        let desc = format!(
            "appsrc name=src \
             ! {parser} \
             ! {decoder} \
             ! videoconvert \
             ! video/x-raw,format={gray} \
             ! appsink name=sink sync=false max-buffers=0 drop=false",
            parser = stream.parser,
            decoder = element.factory,
            gray = PixelFormat::Gray8.gst_name(),
        );
        let pipeline = AppPipeline::launch(&desc)?;

        let caps = gst::Caps::from_str(stream.input_caps)
            .map_err(|e| CodecError::GStreamerPipeline(format!("caps: {e}")))?;
        pipeline.appsrc.set_caps(Some(&caps));

        pipeline.play()?;
        info!("GstDecoder({}) ready for {}", element.factory, codec);
        Ok(Self { pipeline, element: element.factory, decoded: 0, flushed: false })
    }

    fn failed(&self, reason: impl Into<String>) -> CodecError {
        CodecError::DecodeFailed { frame: self.decoded, reason: reason.into() }
    }

    fn check_bus(&self) -> Result<(), CodecError> {
        match self.pipeline.bus_error() {
            Some(reason) => Err(self.failed(reason)),
            None => Ok(()),
        }
    }

    fn pull(&mut self, timeout: gst::ClockTime) -> Result<Option<DecodedFrame>, CodecError> {
        let Some(sample) = self.pipeline.appsink.try_pull_sample(timeout) else {
            return Ok(None);
        };
        let caps = sample.caps().ok_or_else(|| self.failed("sample without caps"))?;
        let info = gst_video::VideoInfo::from_caps(caps)
            .map_err(|e| self.failed(format!("caps: {e}")))?;
        let buffer = sample.buffer().ok_or_else(|| self.failed("no buffer in sample"))?;
        let map = buffer.map_readable().map_err(|_| self.failed("read map failed"))?;

        self.decoded += 1;
        Ok(Some(DecodedFrame {
            data: Bytes::copy_from_slice(map.as_slice()),
            width: info.width(),
            height: info.height(),
            stride: info.stride()[0] as usize,
            format: PixelFormat::Gray8,
        }))
    }
}

impl VideoDecoder for GstDecoder {
    fn decode(&mut self, data: &[u8]) -> Result<DecodeStep, CodecError> {
        if self.flushed {
            return Err(self.failed("input after flush"));
        }
        let buffer = gst::Buffer::from_slice(data.to_vec());
        self.pipeline
            .appsrc
            .push_buffer(buffer)
            .map_err(|e| self.failed(format!("appsrc push failed: {e:?}")))?;
        self.check_bus()?;

        let mut frames = Vec::new();
        while let Some(frame) = self.pull(gst::ClockTime::ZERO)? {
            frames.push(frame);
        }
        Ok(DecodeStep { consumed: data.len(), frames })
    }

    fn flush(&mut self) -> Result<Vec<DecodedFrame>, CodecError> {
        if self.flushed {
            return Err(self.failed("decoder already flushed"));
        }
        self.pipeline
            .appsrc
            .end_of_stream()
            .map_err(|e| self.failed(format!("end_of_stream: {e:?}")))?;
        self.flushed = true;

        let mut frames = Vec::new();
        while let Some(frame) = self.pull(DRAIN_TIMEOUT)? {
            frames.push(frame);
        }
        self.check_bus()?;
        if !self.pipeline.appsink.is_eos() {
            return Err(self.failed("timed out flushing delayed frames"));
        }
        debug!("[GstDecoder] {} flushed {} delayed frames", self.element, frames.len());
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use streamer_core::VideoEncoder;

    use super::*;
    use crate::encoder::tests::{gst_has, small_profile, X264};
    use crate::encoder::GstEncoder;

    const AVDEC: ElementCandidate = ElementCandidate { factory: "avdec_h264", label: "libav" };

    fn encoded_stream(frames: i64) -> Vec<u8> {
        let profile = small_profile();
        let mut encoder = GstEncoder::open(X264, &profile).unwrap();
        let mut frame = streamer_core::Yuv420Frame::new(profile.resolution);
        let mut stream = Vec::new();
        for pts in 0..frames {
            frame.pts = pts;
            if let Some(packet) = encoder.encode(Some(&frame)).unwrap() {
                stream.extend_from_slice(&packet.data);
            }
        }
        while let Some(packet) = encoder.encode(None).unwrap() {
            stream.extend_from_slice(&packet.data);
        }
        stream
    }

    #[test]
    fn every_frame_comes_back_after_a_single_flush() {
        if !gst_has(&["x264enc", "h264parse", "avdec_h264", "videoconvert"]) {
            return;
        }
        let stream = encoded_stream(5);
        let mut decoder = GstDecoder::open(AVDEC, CodecId::H264).unwrap();

        let mut frames = Vec::new();
        for chunk in stream.chunks(4096) {
            let step = decoder.decode(chunk).unwrap();
            assert_eq!(step.consumed, chunk.len());
            frames.extend(step.frames);
        }
        frames.extend(decoder.flush().unwrap());

        assert_eq!(frames.len(), 5);
        assert!(frames.iter().all(|f| f.width == 64 && f.height == 64 && f.stride >= 64));
        assert!(matches!(decoder.flush(), Err(CodecError::DecodeFailed { frame: 5, .. })));
        assert!(matches!(decoder.decode(&stream[..16]), Err(CodecError::DecodeFailed { .. })));
    }
}
