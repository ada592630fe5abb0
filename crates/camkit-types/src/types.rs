//! Camera value types shared by the controller and its backends.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Physical position of a camera on the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DevicePosition {
    /// User-facing camera.
    #[default]
    Front,

    /// World-facing camera.
    Back,
}

impl DevicePosition {
    /// Returns the opposite camera position.
    pub fn flipped(self) -> Self {
        match self {
            Self::Front => Self::Back,
            Self::Back => Self::Front,
        }
    }
}

/// Orientation applied to the video output connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VideoOrientation {
    /// Device upright, home button at the bottom.
    #[default]
    Portrait,

    /// Device upside down.
    PortraitUpsideDown,

    /// Device rotated with the home button on the right.
    LandscapeRight,

    /// Device rotated with the home button on the left.
    LandscapeLeft,
}

impl VideoOrientation {
    /// Returns true for the two portrait orientations.
    pub fn is_portrait(self) -> bool {
        matches!(self, Self::Portrait | Self::PortraitUpsideDown)
    }
}

/// Capture quality preset for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionPreset {
    /// Highest still-photo resolution.
    Photo,

    /// High quality video.
    High,

    /// Medium quality video (default).
    #[default]
    Medium,

    /// Low quality video, suitable for sharing over slow links.
    Low,

    /// CIF, 352x288.
    #[serde(rename = "cif-352x288")]
    Cif352x288,

    /// VGA, 640x480.
    #[serde(rename = "vga-640x480")]
    Vga640x480,

    /// 720p.
    #[serde(rename = "hd-1280x720")]
    Hd1280x720,

    /// 1080p.
    #[serde(rename = "hd-1920x1080")]
    Hd1920x1080,
}

impl SessionPreset {
    /// Stable string name of the preset.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Cif352x288 => "cif-352x288",
            Self::Vga640x480 => "vga-640x480",
            Self::Hd1280x720 => "hd-1280x720",
            Self::Hd1920x1080 => "hd-1920x1080",
        }
    }

    /// Nominal landscape frame dimensions `(width, height)` for this preset.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Photo => (4032, 3024),
            Self::High => (1920, 1080),
            Self::Medium => (480, 360),
            Self::Low => (192, 144),
            Self::Cif352x288 => (352, 288),
            Self::Vga640x480 => (640, 480),
            Self::Hd1280x720 => (1280, 720),
            Self::Hd1920x1080 => (1920, 1080),
        }
    }
}

impl fmt::Display for SessionPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw pixel layout of a frame's image buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 32 bits per pixel, B, G, R, A byte order.
    Bgra32,

    /// Bi-planar 4:2:0 YUV (Y plane followed by interleaved UV).
    Nv12,
}

impl PixelFormat {
    /// Bytes per pixel of the first plane.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Bgra32 => 4,
            Self::Nv12 => 1,
        }
    }
}
