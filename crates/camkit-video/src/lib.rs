//! Camera capture controller.
//!
//! [`Video`] owns a capture session from a [`CaptureBackend`], binds the
//! camera at the requested [`DevicePosition`], applies the requested
//! [`VideoOrientation`] and forwards every frame to a [`VideoListener`].
//! All configuration and frame callbacks run in order on one private
//! thread per controller.

mod backend;
mod bitmap;
mod controller;
mod error;
mod frame;
mod listener;
mod queue;
mod synthetic;
mod worker;

#[cfg(test)]
mod testing;

pub use backend::{
    CaptureBackend, CaptureDevice, CaptureInput, CaptureSession, VideoConnection,
    VideoDataOutput,
};
pub use bitmap::{
    image_from_sample_buffer, try_image_from_sample_buffer, AlphaInfo, BitmapContext,
    BitmapFormat, ByteOrder, ColorSpace,
};
pub use controller::{Video, QUEUE_LABEL};
pub use error::CaptureError;
pub use frame::{CaptureTimestamp, PixelBuffer, PixelBufferLock, SampleBuffer};
pub use listener::VideoListener;
pub use queue::FrameSink;
pub use synthetic::{SyntheticBackend, SyntheticSession, DEFAULT_FPS, MAX_PENDING_FRAMES};

pub use camkit_types::{
    DevicePosition, PixelFormat, SessionPreset, VideoConfig, VideoOrientation,
};

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;
