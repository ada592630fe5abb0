//! Frame types handed to listeners.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use camkit_types::PixelFormat;
use parking_lot::{RwLock, RwLockReadGuard};

/// When a frame was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTimestamp {
    captured_at: Instant,
    presentation_time: Duration,
}

impl CaptureTimestamp {
    /// Stamp a frame captured now by a session that began producing at `session_start`.
    pub fn since(session_start: Instant) -> Self {
        let captured_at = Instant::now();
        Self {
            captured_at,
            presentation_time: captured_at.saturating_duration_since(session_start),
        }
    }

    /// Instant the frame left the camera.
    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Offset of the frame from the start of its session.
    pub fn presentation_time(&self) -> Duration {
        self.presentation_time
    }
}

/// Pixel storage of a frame.
///
/// The base address is only reachable through [`PixelBuffer::lock_base_address`],
/// which returns a guard that unlocks when dropped.
pub struct PixelBuffer {
    width: u32,
    height: u32,
    bytes_per_row: usize,
    format: PixelFormat,
    base: RwLock<Option<Bytes>>,
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.base.read().as_ref().map(Bytes::len);
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes_per_row", &self.bytes_per_row)
            .field("format", &self.format)
            .field("len", &len)
            .finish()
    }
}

impl PixelBuffer {
    /// Create a buffer over `data`, laid out as `height` rows of `bytes_per_row` bytes.
    pub fn new(
        width: u32,
        height: u32,
        bytes_per_row: usize,
        format: PixelFormat,
        data: Bytes,
    ) -> Self {
        Self {
            width,
            height,
            bytes_per_row,
            format,
            base: RwLock::new(Some(data)),
        }
    }

    /// Create a buffer whose memory is not CPU-accessible.
    pub fn without_backing(
        width: u32,
        height: u32,
        bytes_per_row: usize,
        format: PixelFormat,
    ) -> Self {
        Self {
            width,
            height,
            bytes_per_row,
            format,
            base: RwLock::new(None),
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row stride in bytes.
    pub fn bytes_per_row(&self) -> usize {
        self.bytes_per_row
    }

    /// Pixel layout.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Lock the base address for reading.
    pub fn lock_base_address(&self) -> PixelBufferLock<'_> {
        PixelBufferLock {
            guard: self.base.read(),
        }
    }
}

/// Scoped read lock on a [`PixelBuffer`]'s memory.
pub struct PixelBufferLock<'a> {
    guard: RwLockReadGuard<'a, Option<Bytes>>,
}

impl PixelBufferLock<'_> {
    /// The pixel memory, or `None` when the buffer has no CPU-visible backing.
    pub fn base_address(&self) -> Option<&[u8]> {
        self.guard.as_deref()
    }
}

/// A video frame delivered by the capture output.
///
/// Cloning is cheap; the pixel data is shared.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    image_buffer: Option<Arc<PixelBuffer>>,
    timestamp: CaptureTimestamp,
    sequence: u64,
}

impl SampleBuffer {
    /// Create a sample carrying a pixel buffer.
    pub fn new(image_buffer: PixelBuffer, timestamp: CaptureTimestamp, sequence: u64) -> Self {
        Self {
            image_buffer: Some(Arc::new(image_buffer)),
            timestamp,
            sequence,
        }
    }

    /// Create a sample with no image data (e.g. a marker or a discarded frame).
    pub fn empty(timestamp: CaptureTimestamp, sequence: u64) -> Self {
        Self {
            image_buffer: None,
            timestamp,
            sequence,
        }
    }

    /// The frame's pixel buffer, if it has one.
    pub fn image_buffer(&self) -> Option<&PixelBuffer> {
        self.image_buffer.as_deref()
    }

    /// Capture timestamp.
    pub fn timestamp(&self) -> CaptureTimestamp {
        self.timestamp
    }

    /// Monotonically increasing sequence number within a session.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}
