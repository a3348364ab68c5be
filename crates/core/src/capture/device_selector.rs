use thiserror::Error;

use crate::capture::domain::capture_device::{
    CaptureDevice, DeviceDiscovery, DeviceKind, FacingPosition, MediaKind,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no wide-angle camera facing {0}")]
pub struct DeviceNotFound(pub FacingPosition);

/// Picks the camera a session should use.
pub struct DeviceSelector {
    discovery: Box<dyn DeviceDiscovery>,
}

impl DeviceSelector {
    pub fn new(discovery: Box<dyn DeviceDiscovery>) -> Self {
        Self { discovery }
    }

    /// First wide-angle video device at `position`.
    ///
    /// The position is re-checked locally; discovery implementations are not
    /// trusted to have filtered.
    pub fn select_device(&self, position: FacingPosition) -> Result<CaptureDevice, DeviceNotFound> {
        self.discovery
            .devices(MediaKind::Video, position)
            .into_iter()
            .find(|d| d.kind == DeviceKind::WideAngle && d.position == position)
            .ok_or(DeviceNotFound(position))
    }
}
