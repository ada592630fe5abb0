//! Capture backend interface.
//!
//! A backend is the host media framework: it finds cameras, builds inputs
//! and sessions, and pushes frames into the [`FrameSink`] of the output it
//! was given. The controller only ever touches these objects from its
//! configuration queue.

use camkit_types::{DevicePosition, PixelFormat, SessionPreset, VideoOrientation};

use crate::queue::FrameSink;
use crate::CaptureResult;

/// A physical camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureDevice {
    /// Backend-specific identifier.
    pub unique_id: String,

    /// Human-readable name.
    pub name: String,

    /// Where the camera sits on the device.
    pub position: DevicePosition,
}

/// A camera wrapped for attachment to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureInput {
    device: CaptureDevice,
}

impl CaptureInput {
    /// Wrap a device as a session input.
    pub fn new(device: CaptureDevice) -> Self {
        Self { device }
    }

    /// The device behind this input.
    pub fn device(&self) -> &CaptureDevice {
        &self.device
    }
}

/// Session output that delivers raw frames to the controller.
#[derive(Debug, Clone)]
pub struct VideoDataOutput {
    pixel_format: PixelFormat,
    sink: FrameSink,
}

impl VideoDataOutput {
    /// Create an output producing `pixel_format` frames into `sink`.
    pub fn new(sink: FrameSink, pixel_format: PixelFormat) -> Self {
        Self { pixel_format, sink }
    }

    /// Pixel format the output is configured for.
    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// Where produced frames go.
    pub fn sink(&self) -> &FrameSink {
        &self.sink
    }
}

/// Link between the session's input and its video output.
pub trait VideoConnection {
    /// Whether the connection can rotate frames.
    fn is_video_orientation_supported(&self) -> bool;

    /// Apply an orientation. Only called when supported.
    fn set_video_orientation(&mut self, orientation: VideoOrientation);
}

/// A capture session coordinating one input and one output.
pub trait CaptureSession: Send {
    /// Begin an atomic batch of input/output changes.
    fn begin_configuration(&mut self);

    /// Commit the batch started by `begin_configuration`.
    fn commit_configuration(&mut self);

    /// Whether the session has capacity for `input`.
    fn can_add_input(&self, input: &CaptureInput) -> bool;

    /// Attach an input.
    fn add_input(&mut self, input: CaptureInput);

    /// Detach and return the current input.
    fn remove_input(&mut self) -> Option<CaptureInput>;

    /// Whether the session has capacity for `output`.
    fn can_add_output(&self, output: &VideoDataOutput) -> bool;

    /// Attach an output.
    fn add_output(&mut self, output: VideoDataOutput);

    /// Whether a video data output is attached.
    fn has_output(&self) -> bool;

    /// The output's video connection, if one has been formed.
    fn video_connection(&mut self) -> Option<&mut dyn VideoConnection>;

    /// Begin producing frames.
    fn start_running(&mut self);

    /// Stop producing frames. Inputs and outputs stay attached.
    fn stop_running(&mut self);

    /// Whether frames are being produced.
    fn is_running(&self) -> bool;
}

/// Entry point to a media framework.
pub trait CaptureBackend: Send {
    /// Default wide-angle camera at `position`.
    fn default_device(&self, position: DevicePosition) -> Option<CaptureDevice>;

    /// Build a session input for `device`.
    fn create_input(&self, device: &CaptureDevice) -> CaptureResult<CaptureInput>;

    /// Build an empty session using `preset`.
    fn create_session(&mut self, preset: SessionPreset) -> CaptureResult<Box<dyn CaptureSession>>;
}
