//! The camera controller.

use std::sync::{Arc, Weak};

use camkit_types::{DevicePosition, SessionPreset, VideoConfig, VideoOrientation};
use image::RgbaImage;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, trace};

use crate::backend::CaptureBackend;
use crate::bitmap;
use crate::frame::SampleBuffer;
use crate::listener::VideoListener;
use crate::queue::{FrameSink, SerialQueue, Task};
use crate::worker::SessionWorker;

/// Name of the configuration queue thread.
pub const QUEUE_LABEL: &str = "camkit-video";

#[derive(Debug, Clone, Copy)]
struct Settings {
    position: DevicePosition,
    orientation: VideoOrientation,
}

/// Captures video from one camera and forwards frames to a listener.
///
/// All methods return immediately; the work is queued on a private serial
/// thread that also delivers the listener callbacks. Failures are logged and
/// leave the previous configuration in place.
///
/// The listener is held weakly: the caller keeps it alive for as long as
/// frames are wanted. Once it is released, frames are discarded.
pub struct Video {
    preset: SessionPreset,
    settings: Mutex<Settings>,
    queue: SerialQueue,
}

impl Video {
    /// Create a controller using `backend` with the given quality preset,
    /// front camera and portrait orientation.
    pub fn new<L, B>(listener: &Arc<L>, backend: B, preset: SessionPreset) -> Self
    where
        L: VideoListener + 'static,
        B: CaptureBackend + 'static,
    {
        Self::with_config(
            listener,
            backend,
            &VideoConfig {
                preset,
                ..VideoConfig::default()
            },
        )
    }

    /// Create a controller from a full configuration. The configured position
    /// and orientation are initial values and trigger no reconfiguration.
    pub fn with_config<L, B>(listener: &Arc<L>, backend: B, config: &VideoConfig) -> Self
    where
        L: VideoListener + 'static,
        B: CaptureBackend + 'static,
    {
        let listener: Weak<L> = Arc::downgrade(listener);
        let listener: Weak<dyn VideoListener> = listener;

        let (tx, rx) = SerialQueue::channel();
        let worker = SessionWorker::new(
            Box::new(backend),
            listener,
            FrameSink::new(tx.clone()),
            config.preset,
            config.position,
            config.orientation,
        );
        let queue = SerialQueue::spawn(QUEUE_LABEL, tx, move || worker.run(rx));

        debug!(preset = %config.preset, "Video controller created");

        Self {
            preset: config.preset,
            settings: Mutex::new(Settings {
                position: config.position,
                orientation: config.orientation,
            }),
            queue,
        }
    }

    /// Quality preset the session is created with.
    pub fn preset(&self) -> SessionPreset {
        self.preset
    }

    /// Current camera position.
    pub fn position(&self) -> DevicePosition {
        self.settings.lock().position
    }

    /// Switch cameras. Queues a rebind only when the position changes.
    pub fn set_position(&self, position: DevicePosition) {
        let mut settings = self.settings.lock();
        if settings.position == position {
            trace!(?position, "Position unchanged");
            return;
        }
        settings.position = position;
        self.queue.enqueue(Task::SetPosition(position));
    }

    /// Current video orientation.
    pub fn orientation(&self) -> VideoOrientation {
        self.settings.lock().orientation
    }

    /// Rotate the output. Queues the change only when the orientation changes.
    pub fn set_orientation(&self, orientation: VideoOrientation) {
        let mut settings = self.settings.lock();
        if settings.orientation == orientation {
            trace!(?orientation, "Orientation unchanged");
            return;
        }
        settings.orientation = orientation;
        self.queue.enqueue(Task::SetOrientation(orientation));
    }

    /// Begin frame delivery, creating the session on first use.
    #[instrument(name = "video_request_start", skip(self))]
    pub fn start(&self) {
        info!("Start requested");
        self.queue.enqueue(Task::Start);
    }

    /// Halt frame delivery. The session is kept for the next `start`.
    #[instrument(name = "video_request_stop", skip(self))]
    pub fn stop(&self) {
        info!("Stop requested");
        self.queue.enqueue(Task::Stop);
    }

    /// Block until everything queued so far has run. Must not be called from
    /// a listener callback.
    pub fn flush(&self) {
        self.queue.flush();
    }

    /// Convert a frame to an RGBA image, or `None` if the frame's pixels
    /// cannot be read. Independent of any controller.
    pub fn image_from_sample_buffer(sample: &SampleBuffer) -> Option<RgbaImage> {
        bitmap::image_from_sample_buffer(sample)
    }
}
