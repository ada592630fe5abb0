//! Session state owned by the configuration queue.

use std::sync::Weak;

use camkit_types::{DevicePosition, PixelFormat, SessionPreset, VideoOrientation};
use crossbeam_channel::Receiver;
use tracing::{debug, info, instrument, trace, warn};

use crate::backend::{CaptureBackend, CaptureSession, VideoDataOutput};
use crate::error::CaptureError;
use crate::frame::SampleBuffer;
use crate::listener::VideoListener;
use crate::queue::{FrameSink, Task};
use crate::CaptureResult;

/// Lazily created capture session.
pub(crate) enum SessionState {
    /// `start` has not set up a session yet.
    Uninitialized,

    /// Session with its output attached.
    Ready(Box<dyn CaptureSession>),
}

/// Everything the queue mutates. Lives on the worker thread only.
pub(crate) struct SessionWorker {
    backend: Box<dyn CaptureBackend>,
    listener: Weak<dyn VideoListener>,
    sink: FrameSink,
    preset: SessionPreset,
    position: DevicePosition,
    orientation: VideoOrientation,
    session: SessionState,
}

impl SessionWorker {
    pub(crate) fn new(
        backend: Box<dyn CaptureBackend>,
        listener: Weak<dyn VideoListener>,
        sink: FrameSink,
        preset: SessionPreset,
        position: DevicePosition,
        orientation: VideoOrientation,
    ) -> Self {
        Self {
            backend,
            listener,
            sink,
            preset,
            position,
            orientation,
            session: SessionState::Uninitialized,
        }
    }

    /// Process tasks until shutdown.
    pub(crate) fn run(mut self, rx: Receiver<Task>) {
        while let Ok(task) = rx.recv() {
            match task {
                Task::Start => self.start(),
                Task::Stop => self.stop(),
                Task::SetPosition(position) => self.set_position(position),
                Task::SetOrientation(orientation) => self.set_orientation(orientation),
                Task::FrameOutput(sample) => self.frame_output(&sample),
                Task::FrameDropped(sample) => self.frame_dropped(&sample),
                Task::Flush(ack) => {
                    let _ = ack.send(());
                }
                Task::Shutdown => break,
            }
        }

        self.teardown();
    }

    #[instrument(name = "video_start", skip(self))]
    fn start(&mut self) {
        if matches!(self.session, SessionState::Uninitialized) {
            log_failure("Session setup", self.setup_session());
            log_failure("Input setup", self.setup_input());
            log_failure("Orientation setup", self.setup_orientation());
        }

        if let SessionState::Ready(session) = &mut self.session {
            if !session.is_running() {
                session.start_running();
                info!("Capture running");
            }
        }
    }

    #[instrument(name = "video_stop", skip(self))]
    fn stop(&mut self) {
        if let SessionState::Ready(session) = &mut self.session {
            if session.is_running() {
                session.stop_running();
                info!("Capture stopped");
            }
        }
    }

    fn set_position(&mut self, position: DevicePosition) {
        debug!(?position, "Changing camera position");
        self.position = position;
        log_failure("Input setup", self.setup_input());
        log_failure("Orientation setup", self.setup_orientation());
    }

    fn set_orientation(&mut self, orientation: VideoOrientation) {
        debug!(?orientation, "Changing video orientation");
        self.orientation = orientation;
        log_failure("Orientation setup", self.setup_orientation());
    }

    fn frame_output(&mut self, sample: &SampleBuffer) {
        if !self.is_running() {
            trace!(sequence = sample.sequence(), "Discarding frame after stop");
        } else {
            match self.listener.upgrade() {
                Some(listener) => listener.on_frame(sample),
                None => trace!("Listener released, discarding frame"),
            }
        }
        self.sink.complete();
    }

    fn frame_dropped(&mut self, sample: &SampleBuffer) {
        if !self.is_running() {
            trace!(sequence = sample.sequence(), "Discarding drop notice after stop");
            return;
        }
        trace!(sequence = sample.sequence(), "Frame dropped by output");
        if let Some(listener) = self.listener.upgrade() {
            listener.on_dropped_frame(sample);
        }
    }

    fn is_running(&self) -> bool {
        match &self.session {
            SessionState::Ready(session) => session.is_running(),
            SessionState::Uninitialized => false,
        }
    }

    /// Create the session and attach a BGRA output. Leaves the state
    /// uninitialized if the output cannot be added.
    #[instrument(name = "setup_session", skip(self), fields(preset = %self.preset))]
    fn setup_session(&mut self) -> CaptureResult<()> {
        let mut session = self.backend.create_session(self.preset)?;

        let output = VideoDataOutput::new(self.sink.clone(), PixelFormat::Bgra32);
        if !session.can_add_output(&output) {
            return Err(CaptureError::CannotAddOutput);
        }

        session.begin_configuration();
        session.add_output(output);
        session.commit_configuration();

        self.session = SessionState::Ready(session);
        debug!("Session created");
        Ok(())
    }

    /// Bind the camera at the current position. On failure the previous
    /// input stays bound.
    fn setup_input(&mut self) -> CaptureResult<()> {
        let SessionState::Ready(session) = &mut self.session else {
            return Ok(());
        };

        let device = self
            .backend
            .default_device(self.position)
            .ok_or(CaptureError::DeviceNotFound(self.position))?;
        let input = self.backend.create_input(&device)?;

        session.begin_configuration();
        let previous = session.remove_input();
        if !session.can_add_input(&input) {
            if let Some(previous) = previous {
                session.add_input(previous);
            }
            session.commit_configuration();
            return Err(CaptureError::CannotAddInput);
        }
        session.add_input(input);
        session.commit_configuration();

        debug!(device = %device.unique_id, position = ?self.position, "Input bound");
        Ok(())
    }

    fn setup_orientation(&mut self) -> CaptureResult<()> {
        let SessionState::Ready(session) = &mut self.session else {
            return Ok(());
        };
        if !session.has_output() {
            return Ok(());
        }

        let connection = session
            .video_connection()
            .ok_or(CaptureError::MissingConnection)?;

        if connection.is_video_orientation_supported() {
            connection.set_video_orientation(self.orientation);
        } else {
            trace!("Connection does not support orientation");
        }
        Ok(())
    }

    fn teardown(&mut self) {
        if let SessionState::Ready(mut session) =
            std::mem::replace(&mut self.session, SessionState::Uninitialized)
        {
            if session.is_running() {
                session.stop_running();
            }
            debug!("Session released");
        }
    }
}

fn log_failure(step: &str, result: CaptureResult<()>) {
    if let Err(e) = result {
        warn!("{} failed: {}", step, e);
    }
}
