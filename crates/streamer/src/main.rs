//! Desktop streamer: records 10 seconds of the primary screen to `test.h264`.
//!
//! # Architecture
//!
//! ```text
//! ScreenCapturer (GDI, BGRA bottom-up)
//!   │
//!   ▼
//! FrameConverter (flip + BGRA → I420, one context per session)
//!   │
//!   ▼
//! GstEncoder (appsrc → x264enc → h264parse → appsink)
//!   │
//!   ▼
//! test.h264 (packets + 00 00 01 B7)
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use streamer::{encode_to_file, OUTPUT_FILE};
use streamer_capture::{CaptureConfig, ScreenCapturer};
use streamer_codec::CodecRegistry;
use streamer_core::EncoderProfile;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("Streamer v{}", env!("CARGO_PKG_VERSION"));

    let registry = CodecRegistry::gstreamer().context("Registering codecs")?;
    let profile = EncoderProfile::default();

    // GStreamer pulls and GDI blits block; keep them off the async workers.
    let summary = tokio::task::spawn_blocking(move || -> Result<_> {
        let mut capturer = ScreenCapturer::open(CaptureConfig::new(profile.resolution))
            .context("Opening screen capture")?;
        encode_to_file(&registry, &profile, Path::new(OUTPUT_FILE), &mut capturer)
            .with_context(|| format!("Encoding {OUTPUT_FILE}"))
    })
    .await
    .context("Encode task panicked")??;

    info!(
        "Done: {} frames, {} packets, {} bytes",
        summary.frames_submitted, summary.packets_written, summary.bytes_written
    );
    Ok(())
}
