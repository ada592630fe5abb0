//! Serial configuration queue.
//!
//! Every stateful operation of a controller, and every frame notification
//! from its output, is a [`Task`] processed in order by one worker thread.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use camkit_types::{DevicePosition, VideoOrientation};
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, trace, warn};

use crate::error::CaptureError;
use crate::frame::SampleBuffer;
use crate::CaptureResult;

/// Work items run on the configuration queue.
#[derive(Debug)]
pub(crate) enum Task {
    /// Set up the session if needed and begin frame delivery.
    Start,

    /// Halt frame delivery.
    Stop,

    /// Rebind the input to the camera at this position.
    SetPosition(DevicePosition),

    /// Apply this orientation to the output connection.
    SetOrientation(VideoOrientation),

    /// A frame produced by the output.
    FrameOutput(SampleBuffer),

    /// A frame the output discarded.
    FrameDropped(SampleBuffer),

    /// Acknowledge once everything queued before it has run.
    Flush(Sender<()>),

    /// Tear down the session and exit the worker.
    Shutdown,
}

impl Task {
    /// Short name for logging; never includes frame payloads.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::SetPosition(_) => "set-position",
            Self::SetOrientation(_) => "set-orientation",
            Self::FrameOutput(_) => "frame-output",
            Self::FrameDropped(_) => "frame-dropped",
            Self::Flush(_) => "flush",
            Self::Shutdown => "shutdown",
        }
    }

    /// Sequence number of the frame carried by the task, if any.
    pub(crate) fn sequence(&self) -> Option<u64> {
        match self {
            Self::FrameOutput(sample) | Self::FrameDropped(sample) => Some(sample.sequence()),
            _ => None,
        }
    }
}

/// Handle through which a capture output pushes frames onto the queue.
#[derive(Debug, Clone)]
pub struct FrameSink {
    tx: Sender<Task>,
    pending: Arc<AtomicUsize>,
}

impl FrameSink {
    pub(crate) fn new(tx: Sender<Task>) -> Self {
        Self {
            tx,
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Hand a produced frame to the listener.
    pub fn output(&self, sample: SampleBuffer) -> CaptureResult<()> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(Task::FrameOutput(sample)).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(CaptureError::ChannelDisconnected);
        }
        Ok(())
    }

    /// Report a frame that was discarded before delivery.
    pub fn dropped(&self, sample: SampleBuffer) -> CaptureResult<()> {
        self.tx
            .send(Task::FrameDropped(sample))
            .map_err(|_| CaptureError::ChannelDisconnected)
    }

    /// Frames handed to [`output`](Self::output) that the listener has not finished with.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub(crate) fn complete(&self) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Single-worker executor owning the queue's thread.
pub(crate) struct SerialQueue {
    tx: Sender<Task>,
    worker: Option<JoinHandle<()>>,
    worker_id: Option<ThreadId>,
}

impl SerialQueue {
    /// Create the channel backing a queue.
    pub(crate) fn channel() -> (Sender<Task>, Receiver<Task>) {
        crossbeam_channel::unbounded()
    }

    /// Spawn the worker thread running `run`.
    pub(crate) fn spawn<F>(label: &str, tx: Sender<Task>, run: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let worker = match thread::Builder::new().name(label.to_string()).spawn(run) {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("Failed to spawn configuration queue {}: {}", label, e);
                None
            }
        };
        let worker_id = worker.as_ref().map(|handle| handle.thread().id());

        debug!(label, "Configuration queue started");

        Self {
            tx,
            worker,
            worker_id,
        }
    }

    /// Append a task. Never blocks.
    pub(crate) fn enqueue(&self, task: Task) {
        trace!(task = task.name(), sequence = task.sequence(), "Enqueue");
        if let Err(e) = self.tx.send(task) {
            warn!("Configuration queue closed, dropping {}", e.into_inner().name());
        }
    }

    /// Block until every task enqueued before this call has run.
    pub(crate) fn flush(&self) {
        if self.is_worker_thread() {
            warn!("flush() called from the configuration queue, ignoring");
            return;
        }

        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        self.enqueue(Task::Flush(ack_tx));
        let _ = ack_rx.recv();
    }

    fn is_worker_thread(&self) -> bool {
        self.worker_id == Some(thread::current().id())
    }
}

impl Drop for SerialQueue {
    fn drop(&mut self) {
        let _ = self.tx.send(Task::Shutdown);

        if self.is_worker_thread() {
            // Dropped from a listener callback; the worker exits on its own.
            return;
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}
