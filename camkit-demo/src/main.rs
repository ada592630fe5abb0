//! Demo for the camkit controller.
//!
//! Runs the synthetic camera, flips between cameras and orientations, and
//! logs how many frames were delivered and dropped.
//!
//! Usage: `camkit-demo [config.json]`

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use camkit_video::{
    SampleBuffer, SyntheticBackend, Video, VideoConfig, VideoListener, VideoOrientation,
};
use parking_lot::Mutex;
use tracing::{info, warn};

/// Every this many frames, one is converted to an image.
const SNAPSHOT_INTERVAL: u64 = 30;

/// Counts frames, tracks delivery latency and keeps the size of the last
/// converted snapshot.
#[derive(Default)]
struct FrameStats {
    frames: AtomicU64,
    dropped: AtomicU64,
    max_latency_us: AtomicU64,
    snapshot: Mutex<Option<(u32, u32)>>,
}

impl VideoListener for FrameStats {
    fn on_frame(&self, sample: &SampleBuffer) {
        let count = self.frames.fetch_add(1, Ordering::Relaxed) + 1;
        let latency = sample.timestamp().captured_at().elapsed();
        self.max_latency_us
            .fetch_max(latency.as_micros() as u64, Ordering::Relaxed);
        if count % SNAPSHOT_INTERVAL == 0 {
            if let Some(image) = Video::image_from_sample_buffer(sample) {
                *self.snapshot.lock() = Some(image.dimensions());
            }
        }
    }

    fn on_dropped_frame(&self, sample: &SampleBuffer) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        warn!(
            sequence = sample.sequence(),
            at_ms = sample.timestamp().presentation_time().as_millis() as u64,
            "Frame dropped"
        );
    }
}

impl FrameStats {
    fn report(&self, phase: &str) {
        info!(
            phase,
            frames = self.frames.load(Ordering::Relaxed),
            dropped = self.dropped.load(Ordering::Relaxed),
            max_latency_us = self.max_latency_us.load(Ordering::Relaxed),
            snapshot = ?*self.snapshot.lock(),
            "Capture stats"
        );
    }
}

fn load_config() -> anyhow::Result<VideoConfig> {
    match std::env::args().nth(1) {
        Some(path) => VideoConfig::from_path(&path)
            .with_context(|| format!("Failed to load config from {}", path)),
        None => Ok(VideoConfig::default()),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = load_config()?;
    info!(?config, "Starting camkit demo");

    let stats = Arc::new(FrameStats::default());
    let video = Video::with_config(&stats, SyntheticBackend::new(), &config);

    video.start();
    thread::sleep(Duration::from_secs(2));
    stats.report(&format!("{:?} camera", video.position()));

    video.set_position(video.position().flipped());
    video.set_orientation(VideoOrientation::LandscapeRight);
    thread::sleep(Duration::from_secs(2));
    stats.report(&format!("{:?} camera, landscape", video.position()));

    video.stop();
    video.flush();
    stats.report("stopped");

    video.start();
    thread::sleep(Duration::from_secs(1));
    video.stop();
    video.flush();
    stats.report("restarted");

    info!("Demo finished");
    Ok(())
}
