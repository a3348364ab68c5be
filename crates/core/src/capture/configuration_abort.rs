use thiserror::Error;

use crate::capture::domain::capture_device::FacingPosition;

/// Why session configuration stopped short.
///
/// Every variant is non-fatal: the session stays unconfigured and never
/// delivers frames. Aborts are logged and kept for diagnostics but never
/// surfaced to the session owner as an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationAbort {
    #[error("camera access was denied")]
    PermissionDenied,
    #[error("no wide-angle camera facing {0}")]
    DeviceUnavailable(FacingPosition),
    #[error("device could not be opened as an input: {0}")]
    InputUnavailable(String),
    #[error("session rejected the device input")]
    InputRejected,
    #[error("session rejected the video data output")]
    OutputRejected,
    #[error("output has no video connection")]
    ConnectionUnavailable,
    #[error("connection does not support orientation control")]
    OrientationUnsupported,
    #[error("connection does not support mirroring control")]
    MirroringUnsupported,
}

impl ConfigurationAbort {
    /// Stable short code for logs and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            ConfigurationAbort::PermissionDenied => "permission_denied",
            ConfigurationAbort::DeviceUnavailable(_) => "device_unavailable",
            ConfigurationAbort::InputUnavailable(_) => "input_unavailable",
            ConfigurationAbort::InputRejected => "input_rejected",
            ConfigurationAbort::OutputRejected => "output_rejected",
            ConfigurationAbort::ConnectionUnavailable => "connection_unavailable",
            ConfigurationAbort::OrientationUnsupported => "orientation_unsupported",
            ConfigurationAbort::MirroringUnsupported => "mirroring_unsupported",
        }
    }
}
