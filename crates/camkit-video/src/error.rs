//! Error types for the capture controller.

use camkit_types::{DevicePosition, PixelFormat};
use thiserror::Error;

/// Errors that can occur while configuring capture or converting frames.
///
/// None of these cross the [`Video`](crate::Video) boundary; they are
/// logged on the configuration queue and the failed step is skipped.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No camera exists at the requested position.
    #[error("No capture device at position {0:?}")]
    DeviceNotFound(DevicePosition),

    /// The backend could not build an input for the device.
    #[error("Cannot create input for device {device}: {message}")]
    InputConstruction { device: String, message: String },

    /// The backend could not build a session.
    #[error("Cannot create capture session: {0}")]
    SessionConstruction(String),

    /// The session refused the input.
    #[error("Cannot add input to session")]
    CannotAddInput,

    /// The session refused the output.
    #[error("Cannot add output to session")]
    CannotAddOutput,

    /// The output has no video connection.
    #[error("No video connection on output")]
    MissingConnection,

    /// The sample buffer carries no image buffer.
    #[error("Sample buffer has no image buffer")]
    NoImageBuffer,

    /// The pixel buffer's base address is not accessible.
    #[error("Pixel buffer base address is inaccessible")]
    PixelBufferInaccessible,

    /// A bitmap view could not be built over the pixel data.
    #[error("Bitmap context construction failed: {0}")]
    BitmapConstruction(String),

    /// The pixel buffer format is not the one the bitmap view expects.
    #[error("Unsupported pixel format: {0:?}")]
    UnsupportedPixelFormat(PixelFormat),

    /// The configuration queue is gone.
    #[error("Configuration queue disconnected")]
    ChannelDisconnected,
}
