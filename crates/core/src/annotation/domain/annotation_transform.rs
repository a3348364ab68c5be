use crate::shared::region::{DetectionRegion, OverlayRect, Rect, Size};

/// Uniform scale followed by a translation: `p' = p * scale + offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AffineMap {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl AffineMap {
    pub const IDENTITY: AffineMap = AffineMap {
        scale: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
    };

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    pub fn apply_rect(&self, rect: &Rect) -> Rect {
        Rect::new(
            rect.x * self.scale + self.offset_x,
            rect.y * self.scale + self.offset_y,
            rect.width * self.scale,
            rect.height * self.scale,
        )
    }

    pub fn map_region(&self, region: &DetectionRegion) -> OverlayRect {
        OverlayRect {
            rect: self.apply_rect(&region.rect),
            confidence: region.confidence,
            label: region.label.clone(),
        }
    }
}

impl Default for AffineMap {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Maps image pixel coordinates onto a display that shows the image
/// letterboxed: scaled uniformly to fit and centred.
///
/// Without an image, or when either size is degenerate, the identity map is
/// returned.
pub fn compute_transform(display: Size, image: Option<Size>) -> AffineMap {
    let Some(image) = image else {
        return AffineMap::IDENTITY;
    };
    if display.is_degenerate() || image.is_degenerate() {
        return AffineMap::IDENTITY;
    }

    let scale = if display.aspect_ratio() > image.aspect_ratio() {
        display.height / image.height
    } else {
        display.width / image.width
    };
    AffineMap {
        scale,
        offset_x: (display.width - image.width * scale) / 2.0,
        offset_y: (display.height - image.height * scale) / 2.0,
    }
}
