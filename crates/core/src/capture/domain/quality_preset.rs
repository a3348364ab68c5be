use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Named capture profile the hardware may or may not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QualityPreset {
    Hd1920x1080,
    Hd1280x720,
    High,
    Medium,
    Low,
    Photo,
}

/// Highest-first preference list used when nothing else is configured.
pub const DEFAULT_PRESETS: &[QualityPreset] = &[
    QualityPreset::Hd1280x720,
    QualityPreset::High,
    QualityPreset::Medium,
    QualityPreset::Low,
];

impl QualityPreset {
    pub const ALL: &[QualityPreset] = &[
        QualityPreset::Hd1920x1080,
        QualityPreset::Hd1280x720,
        QualityPreset::High,
        QualityPreset::Medium,
        QualityPreset::Low,
        QualityPreset::Photo,
    ];

    /// Fixed output resolution for the explicit-resolution presets.
    /// The others depend on the device.
    pub fn resolution(self) -> Option<(u32, u32)> {
        match self {
            QualityPreset::Hd1920x1080 => Some((1920, 1080)),
            QualityPreset::Hd1280x720 => Some((1280, 720)),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            QualityPreset::Hd1920x1080 => "hd1920x1080",
            QualityPreset::Hd1280x720 => "hd1280x720",
            QualityPreset::High => "high",
            QualityPreset::Medium => "medium",
            QualityPreset::Low => "low",
            QualityPreset::Photo => "photo",
        }
    }
}

impl fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QualityPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        QualityPreset::ALL
            .iter()
            .copied()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| format!("unknown quality preset '{s}'"))
    }
}
