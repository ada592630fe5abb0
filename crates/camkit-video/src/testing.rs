//! Scriptable backend and listener for controller tests.

use std::sync::Arc;
use std::time::Instant;

use camkit_types::{DevicePosition, SessionPreset, VideoOrientation};
use parking_lot::Mutex;

use crate::backend::{
    CaptureBackend, CaptureDevice, CaptureInput, CaptureSession, VideoConnection,
    VideoDataOutput,
};
use crate::error::CaptureError;
use crate::frame::{CaptureTimestamp, SampleBuffer};
use crate::listener::VideoListener;
use crate::queue::FrameSink;
use crate::CaptureResult;

/// Something the fake session or the listener observed, in queue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    SessionCreated,
    OutputAdded,
    InputBound(DevicePosition),
    OrientationApplied(VideoOrientation),
    Running(bool),
    Frame(u64),
    Dropped(u64),
}

pub(crate) type EventLog = Arc<Mutex<Vec<Event>>>;

struct FakeState {
    devices: Vec<DevicePosition>,
    fail_input: bool,
    fail_session: bool,
    refuse_inputs: bool,
    refuse_outputs: bool,
    orientation_supported: bool,
    omit_connection: bool,
    sessions_created: usize,
    input_requests: usize,
    orientation_updates: usize,
    last_preset: Option<SessionPreset>,
    bound: Option<DevicePosition>,
    orientation: Option<VideoOrientation>,
    running: bool,
    released: bool,
    sink: Option<FrameSink>,
    next_sequence: u64,
}

/// Backend whose sessions record every call into a shared log.
#[derive(Clone)]
pub(crate) struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
    log: EventLog,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                devices: vec![DevicePosition::Front, DevicePosition::Back],
                fail_input: false,
                fail_session: false,
                refuse_inputs: false,
                refuse_outputs: false,
                orientation_supported: true,
                omit_connection: false,
                sessions_created: 0,
                input_requests: 0,
                orientation_updates: 0,
                last_preset: None,
                bound: None,
                orientation: None,
                running: false,
                released: false,
                sink: None,
                next_sequence: 0,
            })),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn log(&self) -> EventLog {
        Arc::clone(&self.log)
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.log.lock().clone()
    }

    pub(crate) fn clear_events(&self) {
        self.log.lock().clear();
    }

    pub(crate) fn remove_device(&self, position: DevicePosition) {
        self.state.lock().devices.retain(|p| *p != position);
    }

    pub(crate) fn fail_input_construction(&self, fail: bool) {
        self.state.lock().fail_input = fail;
    }

    pub(crate) fn fail_session_construction(&self, fail: bool) {
        self.state.lock().fail_session = fail;
    }

    pub(crate) fn refuse_inputs(&self, refuse: bool) {
        self.state.lock().refuse_inputs = refuse;
    }

    pub(crate) fn refuse_outputs(&self, refuse: bool) {
        self.state.lock().refuse_outputs = refuse;
    }

    pub(crate) fn support_orientation(&self, supported: bool) {
        self.state.lock().orientation_supported = supported;
    }

    pub(crate) fn omit_connection(&self, omit: bool) {
        self.state.lock().omit_connection = omit;
    }

    pub(crate) fn sessions_created(&self) -> usize {
        self.state.lock().sessions_created
    }

    pub(crate) fn input_requests(&self) -> usize {
        self.state.lock().input_requests
    }

    pub(crate) fn orientation_updates(&self) -> usize {
        self.state.lock().orientation_updates
    }

    pub(crate) fn last_preset(&self) -> Option<SessionPreset> {
        self.state.lock().last_preset
    }

    pub(crate) fn bound_position(&self) -> Option<DevicePosition> {
        self.state.lock().bound
    }

    pub(crate) fn orientation(&self) -> Option<VideoOrientation> {
        self.state.lock().orientation
    }

    pub(crate) fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub(crate) fn session_released(&self) -> bool {
        self.state.lock().released
    }

    pub(crate) fn pending_frames(&self) -> Option<usize> {
        self.state.lock().sink.as_ref().map(FrameSink::pending)
    }

    /// Push a frame through the attached output. Returns its sequence number.
    pub(crate) fn emit_frame(&self) -> Option<u64> {
        let (sink, sample) = self.next_sample()?;
        let sequence = sample.sequence();
        sink.output(sample).ok()?;
        Some(sequence)
    }

    /// Report a dropped frame through the attached output.
    pub(crate) fn emit_dropped(&self) -> Option<u64> {
        let (sink, sample) = self.next_sample()?;
        let sequence = sample.sequence();
        sink.dropped(sample).ok()?;
        Some(sequence)
    }

    fn next_sample(&self) -> Option<(FrameSink, SampleBuffer)> {
        let mut state = self.state.lock();
        let sink = state.sink.clone()?;
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        let sample = SampleBuffer::empty(CaptureTimestamp::since(Instant::now()), sequence);
        Some((sink, sample))
    }
}

impl CaptureBackend for FakeBackend {
    fn default_device(&self, position: DevicePosition) -> Option<CaptureDevice> {
        let state = self.state.lock();
        state.devices.contains(&position).then(|| CaptureDevice {
            unique_id: format!("fake-{:?}", position).to_lowercase(),
            name: format!("Fake {:?} Camera", position),
            position,
        })
    }

    fn create_input(&self, device: &CaptureDevice) -> CaptureResult<CaptureInput> {
        let mut state = self.state.lock();
        state.input_requests += 1;
        if state.fail_input {
            return Err(CaptureError::InputConstruction {
                device: device.unique_id.clone(),
                message: "device busy".to_string(),
            });
        }
        Ok(CaptureInput::new(device.clone()))
    }

    fn create_session(&mut self, preset: SessionPreset) -> CaptureResult<Box<dyn CaptureSession>> {
        {
            let mut state = self.state.lock();
            state.sessions_created += 1;
            if state.fail_session {
                return Err(CaptureError::SessionConstruction("no media services".to_string()));
            }
            state.last_preset = Some(preset);
            state.orientation = Some(VideoOrientation::Portrait);
            state.released = false;
        }
        self.log.lock().push(Event::SessionCreated);

        Ok(Box::new(FakeSession {
            input: None,
            output: None,
            connection: FakeConnection {
                state: Arc::clone(&self.state),
                log: Arc::clone(&self.log),
            },
            running: false,
            state: Arc::clone(&self.state),
            log: Arc::clone(&self.log),
        }))
    }
}

struct FakeConnection {
    state: Arc<Mutex<FakeState>>,
    log: EventLog,
}

impl VideoConnection for FakeConnection {
    fn is_video_orientation_supported(&self) -> bool {
        self.state.lock().orientation_supported
    }

    fn set_video_orientation(&mut self, orientation: VideoOrientation) {
        {
            let mut state = self.state.lock();
            state.orientation = Some(orientation);
            state.orientation_updates += 1;
        }
        self.log.lock().push(Event::OrientationApplied(orientation));
    }
}

struct FakeSession {
    input: Option<CaptureInput>,
    output: Option<VideoDataOutput>,
    connection: FakeConnection,
    running: bool,
    state: Arc<Mutex<FakeState>>,
    log: EventLog,
}

impl CaptureSession for FakeSession {
    fn begin_configuration(&mut self) {}

    fn commit_configuration(&mut self) {}

    fn can_add_input(&self, _input: &CaptureInput) -> bool {
        self.input.is_none() && !self.state.lock().refuse_inputs
    }

    fn add_input(&mut self, input: CaptureInput) {
        let position = input.device().position;
        self.input = Some(input);
        self.state.lock().bound = Some(position);
        self.log.lock().push(Event::InputBound(position));
    }

    fn remove_input(&mut self) -> Option<CaptureInput> {
        self.state.lock().bound = None;
        self.input.take()
    }

    fn can_add_output(&self, _output: &VideoDataOutput) -> bool {
        self.output.is_none() && !self.state.lock().refuse_outputs
    }

    fn add_output(&mut self, output: VideoDataOutput) {
        self.state.lock().sink = Some(output.sink().clone());
        self.output = Some(output);
        self.log.lock().push(Event::OutputAdded);
    }

    fn has_output(&self) -> bool {
        self.output.is_some()
    }

    fn video_connection(&mut self) -> Option<&mut dyn VideoConnection> {
        if self.output.is_none() || self.state.lock().omit_connection {
            return None;
        }
        Some(&mut self.connection)
    }

    fn start_running(&mut self) {
        self.running = true;
        self.state.lock().running = true;
        self.log.lock().push(Event::Running(true));
    }

    fn stop_running(&mut self) {
        self.running = false;
        self.state.lock().running = false;
        self.log.lock().push(Event::Running(false));
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.running = false;
        state.released = true;
    }
}

/// Listener appending every callback to the shared log.
pub(crate) struct RecordingListener {
    log: EventLog,
}

impl RecordingListener {
    pub(crate) fn new(log: EventLog) -> Self {
        Self { log }
    }

    /// Frame and drop callbacks seen so far.
    pub(crate) fn events(&self) -> Vec<Event> {
        self.log
            .lock()
            .iter()
            .filter(|event| matches!(event, Event::Frame(_) | Event::Dropped(_)))
            .cloned()
            .collect()
    }
}

impl VideoListener for RecordingListener {
    fn on_frame(&self, sample: &SampleBuffer) {
        self.log.lock().push(Event::Frame(sample.sequence()));
    }

    fn on_dropped_frame(&self, sample: &SampleBuffer) {
        self.log.lock().push(Event::Dropped(sample.sequence()));
    }
}
