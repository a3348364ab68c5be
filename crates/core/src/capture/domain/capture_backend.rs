use thiserror::Error;

use crate::capture::domain::capture_device::CaptureDevice;
use crate::capture::domain::quality_preset::QualityPreset;
use crate::capture::domain::raw_frame_buffer::{CapturedFrame, RawFrameBuffer};
use crate::execution::serial_queue::QueueHandle;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("device {0} is in use by another client")]
    DeviceBusy(String),
    #[error("device {0} is no longer connected")]
    DeviceDisconnected(String),
    #[error("{0}")]
    Other(String),
}

/// Rotation applied by the connection to produced buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoOrientation {
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
}

/// Controls the input→output connection exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionCapabilities {
    pub supports_orientation: bool,
    pub supports_mirroring: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub orientation: VideoOrientation,
    pub mirrored: bool,
}

/// A device opened as a session input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInput {
    device: CaptureDevice,
}

impl DeviceInput {
    pub fn new(device: CaptureDevice) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &CaptureDevice {
        &self.device
    }
}

/// Receives every captured buffer on the output's sample queue.
///
/// The queue owns the delegate, so calls are serialized and never reentrant.
pub trait SampleBufferDelegate: Send {
    fn capture_output(&mut self, buffer: &RawFrameBuffer<'_>);

    /// Called once when the session stops producing frames.
    fn output_finished(&mut self) {}
}

pub type SampleQueue = QueueHandle<Box<dyn SampleBufferDelegate>>;

/// Frame output attached to a session.
///
/// Backends call [`VideoDataOutput::submit`] from whatever thread their
/// hardware delivers on; the frame is then lent to the delegate on the
/// dedicated sample queue.
#[derive(Clone)]
pub struct VideoDataOutput {
    queue: SampleQueue,
}

impl VideoDataOutput {
    pub fn new(queue: SampleQueue) -> Self {
        Self { queue }
    }

    pub fn queue_label(&self) -> &str {
        self.queue.label()
    }

    /// Hands `frame` to the sample queue. Returns `false` if the queue is gone.
    pub fn submit(&self, frame: CapturedFrame) -> bool {
        self.queue
            .post(move |delegate| delegate.capture_output(&frame.as_raw()))
    }

    pub(crate) fn finish(&self) -> bool {
        self.queue.post(|delegate| delegate.output_finished())
    }
}

/// Platform capture session: an input/output graph that produces frames.
///
/// Only the session-configuration queue ever holds a backend, so methods
/// take `&mut self` freely.
pub trait CaptureBackend: Send {
    fn can_set_preset(&self, preset: QualityPreset) -> bool;
    fn set_preset(&mut self, preset: QualityPreset);
    /// The preset in effect, `None` while the backend default applies.
    fn preset(&self) -> Option<QualityPreset>;

    fn open_input(&mut self, device: &CaptureDevice) -> Result<DeviceInput, BackendError>;
    fn can_add_input(&self, input: &DeviceInput) -> bool;
    fn add_input(&mut self, input: DeviceInput);

    fn can_add_output(&self, output: &VideoDataOutput) -> bool;
    fn add_output(&mut self, output: VideoDataOutput);

    /// Capabilities of the video connection, `None` if input and output are
    /// not connected.
    fn connection(&self) -> Option<ConnectionCapabilities>;
    fn apply_connection(&mut self, settings: ConnectionSettings);

    fn start_running(&mut self);
    fn stop_running(&mut self);
    fn is_running(&self) -> bool;
}
