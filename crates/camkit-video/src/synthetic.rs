//! Software camera backend.
//!
//! Produces BGRA test-pattern frames on a producer thread, sized from the
//! session preset and rotated by the connection orientation. When the
//! listener falls behind by more than [`MAX_PENDING_FRAMES`], new frames
//! are reported as dropped instead of delivered.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use camkit_types::{DevicePosition, PixelFormat, SessionPreset, VideoOrientation};
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::backend::{
    CaptureBackend, CaptureDevice, CaptureInput, CaptureSession, VideoConnection,
    VideoDataOutput,
};
use crate::error::CaptureError;
use crate::frame::{CaptureTimestamp, PixelBuffer, SampleBuffer};
use crate::queue::FrameSink;
use crate::CaptureResult;

/// Frames the listener may hold before new ones are dropped.
pub const MAX_PENDING_FRAMES: usize = 2;

/// Default synthetic frame rate.
pub const DEFAULT_FPS: u32 = 30;

/// Row alignment of generated pixel buffers, in bytes.
const ROW_ALIGNMENT: usize = 64;

/// Backend exposing software cameras at a fixed set of positions.
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    positions: Vec<DevicePosition>,
    fps: u32,
}

impl SyntheticBackend {
    /// Front and back cameras at [`DEFAULT_FPS`].
    pub fn new() -> Self {
        Self::with_positions([DevicePosition::Front, DevicePosition::Back])
    }

    /// Cameras only at the given positions.
    pub fn with_positions(positions: impl IntoIterator<Item = DevicePosition>) -> Self {
        Self {
            positions: positions.into_iter().collect(),
            fps: DEFAULT_FPS,
        }
    }

    /// Set the frame rate of sessions created from now on.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for SyntheticBackend {
    fn default_device(&self, position: DevicePosition) -> Option<CaptureDevice> {
        self.positions.contains(&position).then(|| {
            let label = match position {
                DevicePosition::Front => "front",
                DevicePosition::Back => "back",
            };
            CaptureDevice {
                unique_id: format!("synthetic:{}", label),
                name: format!("Synthetic {} camera", label),
                position,
            }
        })
    }

    fn create_input(&self, device: &CaptureDevice) -> CaptureResult<CaptureInput> {
        if !self.positions.contains(&device.position) {
            return Err(CaptureError::InputConstruction {
                device: device.unique_id.clone(),
                message: "device not available".to_string(),
            });
        }
        Ok(CaptureInput::new(device.clone()))
    }

    fn create_session(&mut self, preset: SessionPreset) -> CaptureResult<Box<dyn CaptureSession>> {
        if self.fps == 0 {
            return Err(CaptureError::SessionConstruction(
                "frame rate must be non-zero".to_string(),
            ));
        }
        debug!(%preset, fps = self.fps, "Creating synthetic session");
        Ok(Box::new(SyntheticSession::new(preset, self.fps)))
    }
}

/// What the producer thread needs to render a frame.
#[derive(Debug, Clone, Copy)]
struct FrameSettings {
    position: Option<DevicePosition>,
    orientation: VideoOrientation,
}

struct SyntheticConnection {
    settings: Arc<Mutex<FrameSettings>>,
}

impl VideoConnection for SyntheticConnection {
    fn is_video_orientation_supported(&self) -> bool {
        true
    }

    fn set_video_orientation(&mut self, orientation: VideoOrientation) {
        self.settings.lock().orientation = orientation;
    }
}

struct Producer {
    handle: JoinHandle<()>,
    should_stop: Arc<AtomicBool>,
}

/// Session driving one synthetic camera.
pub struct SyntheticSession {
    preset: SessionPreset,
    fps: u32,
    input: Option<CaptureInput>,
    output: Option<VideoDataOutput>,
    connection: SyntheticConnection,
    settings: Arc<Mutex<FrameSettings>>,
    sequence: Arc<AtomicU64>,
    producer: Option<Producer>,
    running: bool,
}

impl SyntheticSession {
    fn new(preset: SessionPreset, fps: u32) -> Self {
        let settings = Arc::new(Mutex::new(FrameSettings {
            position: None,
            orientation: VideoOrientation::LandscapeRight,
        }));

        Self {
            preset,
            fps,
            input: None,
            output: None,
            connection: SyntheticConnection {
                settings: Arc::clone(&settings),
            },
            settings,
            sequence: Arc::new(AtomicU64::new(0)),
            producer: None,
            running: false,
        }
    }
}

impl CaptureSession for SyntheticSession {
    fn begin_configuration(&mut self) {
        trace!("Begin configuration");
    }

    fn commit_configuration(&mut self) {
        trace!("Commit configuration");
    }

    fn can_add_input(&self, _input: &CaptureInput) -> bool {
        self.input.is_none()
    }

    fn add_input(&mut self, input: CaptureInput) {
        self.settings.lock().position = Some(input.device().position);
        self.input = Some(input);
    }

    fn remove_input(&mut self) -> Option<CaptureInput> {
        self.settings.lock().position = None;
        self.input.take()
    }

    fn can_add_output(&self, output: &VideoDataOutput) -> bool {
        self.output.is_none() && output.pixel_format() == PixelFormat::Bgra32
    }

    fn add_output(&mut self, output: VideoDataOutput) {
        self.output = Some(output);
    }

    fn has_output(&self) -> bool {
        self.output.is_some()
    }

    fn video_connection(&mut self) -> Option<&mut dyn VideoConnection> {
        if self.output.is_none() || self.input.is_none() {
            return None;
        }
        Some(&mut self.connection)
    }

    fn start_running(&mut self) {
        if self.running {
            return;
        }
        self.running = true;

        let Some(output) = &self.output else {
            warn!("Synthetic session running without an output");
            return;
        };

        let should_stop = Arc::new(AtomicBool::new(false));
        let job = FrameJob {
            sink: output.sink().clone(),
            settings: Arc::clone(&self.settings),
            sequence: Arc::clone(&self.sequence),
            dimensions: self.preset.dimensions(),
            interval: Duration::from_nanos(1_000_000_000 / self.fps as u64),
            should_stop: Arc::clone(&should_stop),
        };

        match thread::Builder::new()
            .name("camkit-synthetic".to_string())
            .spawn(move || job.run())
        {
            Ok(handle) => {
                self.producer = Some(Producer {
                    handle,
                    should_stop,
                });
                info!(preset = %self.preset, fps = self.fps, "Synthetic capture started");
            }
            Err(e) => warn!("Failed to spawn synthetic producer: {}", e),
        }
    }

    fn stop_running(&mut self) {
        self.running = false;
        if let Some(producer) = self.producer.take() {
            producer.should_stop.store(true, Ordering::SeqCst);
            let _ = producer.handle.join();
            info!("Synthetic capture stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

impl Drop for SyntheticSession {
    fn drop(&mut self) {
        self.stop_running();
    }
}

/// State moved onto the producer thread.
struct FrameJob {
    sink: FrameSink,
    settings: Arc<Mutex<FrameSettings>>,
    sequence: Arc<AtomicU64>,
    dimensions: (u32, u32),
    interval: Duration,
    should_stop: Arc<AtomicBool>,
}

impl FrameJob {
    fn run(self) {
        let start_time = Instant::now();

        while !self.should_stop.load(Ordering::SeqCst) {
            let frame_start = Instant::now();
            let settings = *self.settings.lock();

            // No input bound, no frames.
            if let Some(position) = settings.position {
                let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
                let timestamp = CaptureTimestamp::since(start_time);

                let result = if self.sink.pending() >= MAX_PENDING_FRAMES {
                    trace!(sequence, "Listener behind, dropping frame");
                    self.sink.dropped(SampleBuffer::empty(timestamp, sequence))
                } else {
                    let (width, height) = oriented_dimensions(self.dimensions, settings.orientation);
                    let buffer = render_test_pattern(width, height, position, sequence);
                    self.sink.output(SampleBuffer::new(buffer, timestamp, sequence))
                };

                if let Err(e) = result {
                    debug!("Synthetic producer exiting: {}", e);
                    break;
                }
            }

            let elapsed = frame_start.elapsed();
            if elapsed < self.interval {
                thread::sleep(self.interval - elapsed);
            }
        }
    }
}

/// Preset dimensions are landscape; portrait orientations swap them.
fn oriented_dimensions((width, height): (u32, u32), orientation: VideoOrientation) -> (u32, u32) {
    if orientation.is_portrait() {
        (height, width)
    } else {
        (width, height)
    }
}

/// Gradient background tinted by camera position with a vertical bar that
/// moves with the sequence number.
fn render_test_pattern(
    width: u32,
    height: u32,
    position: DevicePosition,
    sequence: u64,
) -> PixelBuffer {
    let w = width as usize;
    let h = height as usize;
    let bytes_per_row = (w * 4).div_ceil(ROW_ALIGNMENT) * ROW_ALIGNMENT;
    let mut data = vec![0u8; bytes_per_row * h];

    let tint = match position {
        DevicePosition::Front => 64,
        DevicePosition::Back => 192,
    };
    let bar_x = (sequence as usize * 4) % w.max(1);

    for (y, row) in data.chunks_exact_mut(bytes_per_row).enumerate() {
        for (x, px) in row[..w * 4].chunks_exact_mut(4).enumerate() {
            if x.abs_diff(bar_x) < 2 {
                px.copy_from_slice(&[255, 255, 255, 255]);
            } else {
                px[0] = (x * 255 / w) as u8;
                px[1] = (y * 255 / h) as u8;
                px[2] = tint;
                px[3] = 255;
            }
        }
    }

    PixelBuffer::new(width, height, bytes_per_row, PixelFormat::Bgra32, Bytes::from(data))
}
