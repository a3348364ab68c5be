use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which side of the device a camera points toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingPosition {
    Front,
    Back,
}

impl fmt::Display for FacingPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacingPosition::Front => write!(f, "front"),
            FacingPosition::Back => write!(f, "back"),
        }
    }
}

impl FromStr for FacingPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "front" => Ok(FacingPosition::Front),
            "back" => Ok(FacingPosition::Back),
            other => Err(format!("facing position must be 'front' or 'back', got '{other}'")),
        }
    }
}

/// Lens class of a physical camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    WideAngle,
    UltraWide,
    Telephoto,
    External,
}

/// Media a device is asked to produce. Only video is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
}

/// Opaque handle to a physical camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureDevice {
    pub id: String,
    pub name: String,
    pub position: FacingPosition,
    pub kind: DeviceKind,
}

impl CaptureDevice {
    pub fn new(id: impl Into<String>, position: FacingPosition, kind: DeviceKind) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            position,
            kind,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Platform device enumeration.
pub trait DeviceDiscovery: Send {
    fn devices(&self, media: MediaKind, position: FacingPosition) -> Vec<CaptureDevice>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("front", FacingPosition::Front)]
    #[case("Back", FacingPosition::Back)]
    #[case(" FRONT ", FacingPosition::Front)]
    fn test_parse_position(#[case] input: &str, #[case] expected: FacingPosition) {
        assert_eq!(input.parse::<FacingPosition>().unwrap(), expected);
    }

    #[test]
    fn test_parse_position_rejects_unknown() {
        assert!("side".parse::<FacingPosition>().is_err());
    }

    #[test]
    fn test_position_display_round_trips_through_serde_names() {
        let json = serde_json::to_string(&FacingPosition::Front).unwrap();
        assert_eq!(json, "\"front\"");
        assert_eq!(FacingPosition::Back.to_string(), "back");
    }

    #[test]
    fn test_device_name_defaults_to_id() {
        let device = CaptureDevice::new("cam0", FacingPosition::Back, DeviceKind::WideAngle);
        assert_eq!(device.name, "cam0");
        let named = device.with_name("Back Camera");
        assert_eq!(named.name, "Back Camera");
        assert_eq!(named.id, "cam0");
    }
}
