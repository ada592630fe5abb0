//! Frame listener interface.

use crate::frame::SampleBuffer;

/// Receiver of the frames produced by a [`Video`](crate::Video) controller.
///
/// Both methods run on the controller's configuration queue, serialized with
/// reconfiguration. Implementations that touch UI state must hand the work to
/// their own thread. The sample must not be assumed valid after the call
/// returns unless it is cloned.
pub trait VideoListener: Send + Sync {
    /// A frame was delivered.
    fn on_frame(&self, sample: &SampleBuffer);

    /// A frame was dropped by the output, typically because earlier frames
    /// were still being processed.
    fn on_dropped_frame(&self, sample: &SampleBuffer);
}
