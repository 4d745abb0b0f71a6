//! GStreamer encode pipeline.
//!
//! Pipeline:
//! ```text
//! appsrc (I420, framerate from the profile time base)
//!   → <encoder + tuning properties>
//!   → video/x-h264,stream-format=byte-stream,alignment=au   (or MPEG-1 ES caps)
//!   → h264parse / mpegvideoparse
//!   → appsink
//! ```
//!
//! The appsink is pulled synchronously: at most one packet per `encode` call.

use bytes::Bytes;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_video as gst_video;
use gstreamer_video::prelude::*;
use streamer_core::{
    CodecError, CodecId, EncodedPacket, EncoderProfile, Rational, VideoEncoder, Yuv420Frame,
};
use tracing::{debug, info};

use crate::pipeline::{AppPipeline, DRAIN_TIMEOUT};
use crate::registry::{bitstream, ElementCandidate};

/// Element properties realising `profile` on `factory`.
pub fn encoder_properties(factory: &str, profile: &EncoderProfile) -> String {
    let kbps = profile.bitrate_kbps();
    match factory {
        "x264enc" => {
            let mut props = format!(
                "bitrate={kbps} key-int-max={} bframes={} ref={} qp-min={} qp-max={} qp-step={} \
                 trellis={} ip-factor={:.2}",
                profile.gop_size,
                profile.max_b_frames,
                profile.refs,
                profile.qmin,
                profile.qmax,
                profile.max_qdiff,
                profile.trellis,
                1.0 / profile.i_quant_factor,
            );
            if let Some(preset) = &profile.preset {
                props.push_str(&format!(" speed-preset={preset}"));
            }
            props.push_str(&format!(
                " option-string=\"min-keyint={}:qcomp={}\"",
                profile.keyint_min, profile.qcompress
            ));
            props
        }
        "mfh264enc" => format!(
            "bitrate={kbps} gop-size={} bframes={} ref={} min-qp={} max-qp={}",
            profile.gop_size, profile.max_b_frames, profile.refs, profile.qmin, profile.qmax
        ),
        "nvh264enc" => format!(
            "bitrate={kbps} gop-size={} bframes={} qp-min={} qp-max={} preset=hq",
            profile.gop_size, profile.max_b_frames, profile.qmin, profile.qmax
        ),
        "avenc_mpeg1video" => format!(
            "bitrate={} gop-size={}",
            profile.bitrate_bps, profile.gop_size
        ),
        _ => String::new(),
    }
}

// ── GstEncoder ────────────────────────────────────────────────────────────────

/// Raw frames appsrc may hold before `push_buffer` blocks.
pub(crate) const QUEUED_FRAMES: u64 = 2;

/// `gst-launch` description of the encode pipeline for `element`.
///
/// The appsrc blocks once `queue_bytes` are waiting so capture cannot run
/// ahead of the encoder.
pub(crate) fn encoder_pipeline(element: &ElementCandidate, profile: &EncoderProfile, queue_bytes: u64) -> String {
    let stream = bitstream(profile.codec);
    format!(
        "appsrc name=src format=time block=true max-bytes={queue_bytes} \
         ! {enc} {props} \
         ! {caps} \
         ! {parser} \
         ! appsink name=sink sync=false max-buffers=0 drop=false",
        enc = element.factory,
        props = encoder_properties(element.factory, profile),
        caps = stream.output_caps,
        parser = stream.parser,
    )
}

pub struct GstEncoder {
    pipeline:      AppPipeline,
    info:          gst_video::VideoInfo,
    codec:         CodecId,
    element:       &'static str,
    /// Nanoseconds per time-base tick.
    tick_ns:       u64,
    drain_timeout: gst::ClockTime,
    eos_sent:      bool,
    /// PTS of the last submitted frame, for error reports.
    last_pts:      i64,
}

impl GstEncoder {
    /// Build and start the pipeline. Requires GStreamer to be initialised and
    /// `profile` to have passed [`EncoderProfile::validate`].
    pub fn open(element: ElementCandidate, profile: &EncoderProfile) -> Result<Self, CodecError> {
        let Rational { num, den } = profile.time_base;
        let info = gst_video::VideoInfo::builder(
            gst_video::VideoFormat::I420,
            profile.resolution.width,
            profile.resolution.height,
        )
        .fps(gst::Fraction::new(den as i32, num as i32))
        .build()
        .map_err(|e| CodecError::GStreamerPipeline(format!("VideoInfo: {e}")))?;
        let caps = info
            .to_caps()
            .map_err(|e| CodecError::GStreamerPipeline(format!("caps: {e}")))?;

        let queue_bytes = QUEUED_FRAMES * info.size() as u64;
        let pipeline = AppPipeline::launch(&encoder_pipeline(&element, profile, queue_bytes))?;
        pipeline.appsrc.set_caps(Some(&caps));

        pipeline.play()?;
        info!(
            "Encoder pipeline running: {} {} @{}fps {}kbps gop={} bframes={} ({})",
            profile.codec,
            profile.resolution,
            profile.fps(),
            profile.bitrate_kbps(),
            profile.gop_size,
            profile.max_b_frames,
            element.factory
        );

        Ok(Self::with_pipeline(pipeline, info, profile, element.factory))
    }

    fn with_pipeline(
        pipeline: AppPipeline,
        info: gst_video::VideoInfo,
        profile: &EncoderProfile,
        element: &'static str,
    ) -> Self {
        Self {
            pipeline,
            info,
            codec: profile.codec,
            element,
            tick_ns: profile.time_base.tick_nanos(),
            drain_timeout: DRAIN_TIMEOUT,
            eos_sent: false,
            last_pts: -1,
        }
    }

    fn failed(&self, reason: impl Into<String>) -> CodecError {
        CodecError::EncodeFailed { frame: self.last_pts, reason: reason.into() }
    }

    fn check_bus(&self) -> Result<(), CodecError> {
        match self.pipeline.bus_error() {
            Some(reason) => Err(self.failed(reason)),
            None => Ok(()),
        }
    }

    fn push(&mut self, frame: &Yuv420Frame) -> Result<(), CodecError> {
        self.last_pts = frame.pts;
        if frame.resolution().width != self.info.width()
            || frame.resolution().height != self.info.height()
        {
            return Err(self.failed(format!(
                "frame is {}, encoder opened for {}x{}",
                frame.resolution(),
                self.info.width(),
                self.info.height()
            )));
        }

        let mut buffer = gst::Buffer::with_size(self.info.size())
            .map_err(|_| self.failed("buffer alloc failed"))?;
        {
            let buffer_mut = buffer
                .get_mut()
                .ok_or_else(|| self.failed("buffer not writable"))?;
            let pts = frame.pts.max(0) as u64;
            buffer_mut.set_pts(gst::ClockTime::from_nseconds(pts * self.tick_ns));
            buffer_mut.set_duration(gst::ClockTime::from_nseconds(self.tick_ns));
        }

        let mut video_frame = gst_video::VideoFrame::from_buffer_writable(buffer, &self.info)
            .map_err(|_| self.failed("map failed"))?;
        for plane in 0..Yuv420Frame::PLANES {
            let dst_stride = video_frame.plane_stride()[plane] as usize;
            let src_stride = frame.stride(plane);
            let src = frame.plane(plane);
            let dst = video_frame
                .plane_data_mut(plane as u32)
                .map_err(|e| CodecError::EncodeFailed { frame: frame.pts, reason: e.to_string() })?;
            for row in 0..frame.plane_height(plane) {
                let s = &src[row * src_stride..(row + 1) * src_stride];
                dst[row * dst_stride..row * dst_stride + src_stride].copy_from_slice(s);
            }
        }

        self.pipeline
            .appsrc
            .push_buffer(video_frame.into_buffer())
            .map_err(|e| self.failed(format!("appsrc push failed: {e:?}")))?;
        self.check_bus()
    }

    fn pull(&self, timeout: gst::ClockTime) -> Result<Option<EncodedPacket>, CodecError> {
        let Some(sample) = self.pipeline.appsink.try_pull_sample(timeout) else {
            return Ok(None);
        };
        let buffer = sample.buffer().ok_or_else(|| self.failed("no buffer in sample"))?;
        let map = buffer.map_readable().map_err(|_| self.failed("read map failed"))?;
        let pts = match (buffer.pts(), self.tick_ns) {
            (Some(t), tick) if tick > 0 => Some((t.nseconds() / tick) as i64),
            _ => None,
        };
        Ok(Some(EncodedPacket {
            data: Bytes::copy_from_slice(map.as_slice()),
            pts,
            is_keyframe: !buffer.flags().contains(gst::BufferFlags::DELTA_UNIT),
        }))
    }

    fn drain_one(&mut self) -> Result<Option<EncodedPacket>, CodecError> {
        if !self.eos_sent {
            self.pipeline
                .appsrc
                .end_of_stream()
                .map_err(|e| self.failed(format!("end_of_stream: {e:?}")))?;
            self.eos_sent = true;
            debug!("[GstEncoder] EOS sent, draining {}", self.element);
        }
        if let Some(packet) = self.pull(self.drain_timeout)? {
            return Ok(Some(packet));
        }
        self.check_bus()?;
        if self.pipeline.appsink.is_eos() {
            Ok(None)
        } else {
            Err(self.failed("timed out draining delayed frames"))
        }
    }
}

impl VideoEncoder for GstEncoder {
    fn codec(&self) -> CodecId {
        self.codec
    }

    fn encode(&mut self, frame: Option<&Yuv420Frame>) -> Result<Option<EncodedPacket>, CodecError> {
        match frame {
            Some(frame) => {
                if self.eos_sent {
                    return Err(self.failed("frame submitted after end of stream"));
                }
                self.push(frame)?;
                self.pull(gst::ClockTime::ZERO)
            }
            None => self.drain_one(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use streamer_core::Resolution;

    use super::*;

    /// True when GStreamer initialises and every factory in `factories` exists.
    pub(crate) fn gst_has(factories: &[&str]) -> bool {
        gst::init().is_ok() && factories.iter().all(|f| gst::ElementFactory::find(f).is_some())
    }

    pub(crate) fn small_profile() -> EncoderProfile {
        EncoderProfile {
            resolution: Resolution::new(64, 64),
            preset: Some("ultrafast".to_owned()),
            frame_count: 5,
            ..Default::default()
        }
    }

    pub(crate) const X264: ElementCandidate = ElementCandidate { factory: "x264enc", label: "x264" };

    #[test]
    fn x264_properties_carry_the_profile() {
        let props = encoder_properties("x264enc", &EncoderProfile::default());
        assert!(props.starts_with("bitrate=1200 "));
        assert!(props.contains("key-int-max=10"));
        assert!(props.contains("bframes=1"));
        assert!(props.contains("ref=4"));
        assert!(props.contains("qp-min=20 qp-max=51 qp-step=4"));
        assert!(props.contains("trellis=true"));
        assert!(props.contains("ip-factor=1.41"));
        assert!(props.contains("speed-preset=slow"));
        assert!(props.contains("option-string=\"min-keyint=1:qcomp=0.6\""));
    }

    #[test]
    fn preset_is_optional() {
        let profile = EncoderProfile { preset: None, ..Default::default() };
        assert!(!encoder_properties("x264enc", &profile).contains("speed-preset"));
    }

    #[test]
    fn mpeg1_bitrate_is_in_bits() {
        let profile = EncoderProfile { codec: CodecId::Mpeg1Video, ..Default::default() };
        assert_eq!(
            encoder_properties("avenc_mpeg1video", &profile),
            "bitrate=1200000 gop-size=10"
        );
    }

    #[test]
    fn appsrc_blocks_on_a_bounded_queue() {
        let desc = encoder_pipeline(&X264, &EncoderProfile::default(), 6_220_800);
        assert!(desc.starts_with("appsrc name=src format=time block=true max-bytes=6220800 "));
        assert!(desc.contains("! x264enc bitrate=1200 "));
        assert!(desc.ends_with("appsink name=sink sync=false max-buffers=0 drop=false"));
    }

    #[test]
    fn drain_ends_at_eos_and_rejects_later_frames() {
        if !gst_has(&["x264enc", "h264parse"]) {
            return;
        }
        let profile = small_profile();
        let mut encoder = GstEncoder::open(X264, &profile).unwrap();
        let mut frame = Yuv420Frame::new(profile.resolution);

        let mut packets = 0;
        for pts in 0..5 {
            frame.pts = pts;
            if encoder.encode(Some(&frame)).unwrap().is_some() {
                packets += 1;
            }
        }
        while encoder.encode(None).unwrap().is_some() {
            packets += 1;
        }

        assert_eq!(packets, 5);
        assert!(encoder.encode(None).unwrap().is_none());
        assert!(matches!(
            encoder.encode(Some(&frame)),
            Err(CodecError::EncodeFailed { frame: 4, .. })
        ));
    }

    #[test]
    fn drain_without_eos_from_the_sink_is_an_error() {
        if !gst_has(&["appsrc", "appsink"]) {
            return;
        }
        let profile = small_profile();
        // Never set to Playing, so end of stream cannot reach the sink.
        let pipeline = AppPipeline::launch("appsrc name=src ! appsink name=sink").unwrap();
        let info = gst_video::VideoInfo::builder(gst_video::VideoFormat::I420, 64, 64)
            .build()
            .unwrap();
        let mut encoder = GstEncoder::with_pipeline(pipeline, info, &profile, "none");
        encoder.drain_timeout = gst::ClockTime::from_mseconds(50);

        assert!(matches!(encoder.encode(None), Err(CodecError::EncodeFailed { .. })));
    }
}
