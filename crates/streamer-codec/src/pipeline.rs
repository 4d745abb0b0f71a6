//! appsrc → … → appsink plumbing shared by the encoder and decoder.

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app::{AppSink, AppSrc};
use streamer_core::CodecError;

/// How long a drain/flush pull may block waiting for the next output.
pub(crate) const DRAIN_TIMEOUT: gst::ClockTime = gst::ClockTime::from_seconds(10);

pub(crate) struct AppPipeline {
    pub pipeline: gst::Pipeline,
    pub appsrc:   AppSrc,
    pub appsink:  AppSink,
}

impl AppPipeline {
    /// Parse `desc`, which must contain `appsrc name=src` and `appsink name=sink`.
    pub fn launch(desc: &str) -> Result<Self, CodecError> {
        tracing::debug!("Pipeline: {}", desc);

        let pipeline = gst::parse::launch(desc)
            .map_err(|e| CodecError::GStreamerPipeline(e.to_string()))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| CodecError::GStreamerPipeline("Not a pipeline".into()))?;

        let appsrc = pipeline
            .by_name("src")
            .and_then(|element| element.downcast::<AppSrc>().ok())
            .ok_or_else(|| CodecError::GStreamerPipeline("No appsrc".into()))?;

        let appsink = pipeline
            .by_name("sink")
            .and_then(|element| element.downcast::<AppSink>().ok())
            .ok_or_else(|| CodecError::GStreamerPipeline("No appsink".into()))?;

        Ok(Self { pipeline, appsrc, appsink })
    }

    pub fn play(&self) -> Result<(), CodecError> {
        self.pipeline
            .set_state(gst::State::Playing)
            .map(|_| ())
            .map_err(|_| CodecError::GStreamerPipeline("Failed to start pipeline".into()))
    }

    /// First error posted on the bus since the last call, if any.
    pub fn bus_error(&self) -> Option<String> {
        let bus = self.pipeline.bus()?;
        let msg = bus.pop_filtered(&[gst::MessageType::Error])?;
        match msg.view() {
            gst::MessageView::Error(err) => Some(match err.debug() {
                Some(debug) => format!("{} ({})", err.error(), debug),
                None => err.error().to_string(),
            }),
            _ => None,
        }
    }
}

impl Drop for AppPipeline {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}
