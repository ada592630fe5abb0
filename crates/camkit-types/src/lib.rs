//! Shared camera configuration types for camkit.
//!
//! This crate defines the value types used to configure a capture
//! controller: camera position, video orientation, quality presets and
//! the serializable controller configuration.

mod config;
mod types;

pub use config::{ConfigError, VideoConfig};
pub use types::{DevicePosition, PixelFormat, SessionPreset, VideoOrientation};
