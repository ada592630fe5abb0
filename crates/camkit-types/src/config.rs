//! Controller configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{DevicePosition, SessionPreset, VideoOrientation};

/// Errors raised while loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration is not valid JSON for a `VideoConfig`.
    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration for a camera controller.
///
/// `preset` is fixed at construction; `position` and `orientation` are the
/// initial values of the controller's mutable properties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Capture quality preset (default: medium).
    pub preset: SessionPreset,

    /// Initial camera position (default: front).
    pub position: DevicePosition,

    /// Initial video orientation (default: portrait).
    pub orientation: VideoOrientation,
}

impl VideoConfig {
    /// Parse a configuration from a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
