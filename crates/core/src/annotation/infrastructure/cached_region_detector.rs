use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::annotation::domain::region_detector::{
    DetectionCompletion, ImageOrientation, RegionDetector,
};
use crate::shared::decoded_image::DecodedImage;
use crate::shared::region::DetectionRegion;

#[derive(Debug, Error)]
pub enum DetectionCacheError {
    #[error("failed to read detections: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid detections file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Replays pre-computed detection results by frame sequence number.
///
/// The JSON form maps sequence numbers to region lists:
/// `{"0": [{"rect": {"x": 1, "y": 2, "width": 3, "height": 4}, "confidence": 0.9}]}`.
/// Frames without an entry have no regions.
#[derive(Clone)]
pub struct CachedRegionDetector {
    cache: Arc<HashMap<u64, Vec<DetectionRegion>>>,
}

impl CachedRegionDetector {
    pub fn new(cache: Arc<HashMap<u64, Vec<DetectionRegion>>>) -> Self {
        Self { cache }
    }

    pub fn from_json(json: &str) -> Result<Self, DetectionCacheError> {
        let cache: HashMap<u64, Vec<DetectionRegion>> = serde_json::from_str(json)?;
        Ok(Self::new(Arc::new(cache)))
    }

    pub fn load(path: &Path) -> Result<Self, DetectionCacheError> {
        let json = std::fs::read_to_string(path)?;
        let detector = Self::from_json(&json)?;
        log::info!(
            "Loaded detections for {} frame(s) from {}",
            detector.cache.len(),
            path.display()
        );
        Ok(detector)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl RegionDetector for CachedRegionDetector {
    fn process(
        &mut self,
        image: &DecodedImage,
        _orientation: ImageOrientation,
        completion: DetectionCompletion,
    ) {
        completion(Ok(self
            .cache
            .get(&image.sequence())
            .cloned()
            .unwrap_or_default()));
    }
}
