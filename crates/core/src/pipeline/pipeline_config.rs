use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::capture_session::SessionOptions;
use crate::capture::domain::capture_device::FacingPosition;
use crate::capture::domain::quality_preset::{QualityPreset, DEFAULT_PRESETS};
use crate::shared::constants::{DEFAULT_DISPLAY_HEIGHT, DEFAULT_DISPLAY_WIDTH};
use crate::shared::region::Size;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Capture pipeline settings, stored as JSON. Missing fields take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub position: FacingPosition,
    pub presets: Vec<QualityPreset>,
    pub display_width: f64,
    pub display_height: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            position: FacingPosition::Front,
            presets: DEFAULT_PRESETS.to_vec(),
            display_width: DEFAULT_DISPLAY_WIDTH,
            display_height: DEFAULT_DISPLAY_HEIGHT,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(io_error)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.display().is_degenerate() {
            return Err(ConfigError::Invalid(format!(
                "display size must be positive, got {}x{}",
                self.display_width, self.display_height
            )));
        }
        Ok(())
    }

    pub fn display(&self) -> Size {
        Size::new(self.display_width, self.display_height)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions::new(self.position).with_presets(self.presets.clone())
    }
}
