use serde::{Deserialize, Serialize};

/// Width and height of an image or a display surface, in points or pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True when either side is zero, negative or not a finite number.
    pub fn is_degenerate(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width / self.height
    }
}

/// Axis-aligned rectangle with its origin at the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }
}

/// A detector hit in the pixel space of the image that was fed to the detector.
///
/// `confidence` and `label` are carried through untouched; the pipeline
/// never interprets them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionRegion {
    pub rect: Rect,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub label: Option<String>,
}

impl DetectionRegion {
    pub fn new(rect: Rect, confidence: f32) -> Self {
        Self {
            rect,
            confidence,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A detection region mapped into display-surface coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlayRect {
    pub rect: Rect,
    pub confidence: f32,
    pub label: Option<String>,
}
