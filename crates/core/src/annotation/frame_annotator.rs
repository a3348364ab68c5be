use serde::Serialize;

use crate::annotation::domain::annotation_transform::compute_transform;
use crate::annotation::domain::region_detector::{ImageOrientation, RegionDetector};
use crate::capture::domain::capture_device::FacingPosition;
use crate::shared::decoded_image::DecodedImage;
use crate::shared::region::{OverlayRect, Size};

/// Detector results for one frame, positioned on the display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub sequence: u64,
    pub display: Size,
    pub overlays: Vec<OverlayRect>,
}

/// Runs the detector on delivered frames and maps its regions into display
/// coordinates.
pub struct FrameAnnotator {
    detector: Box<dyn RegionDetector>,
    orientation: ImageOrientation,
    display: Size,
}

impl FrameAnnotator {
    pub fn new(detector: Box<dyn RegionDetector>, position: FacingPosition, display: Size) -> Self {
        Self {
            detector,
            orientation: ImageOrientation::for_position(position),
            display,
        }
    }

    pub fn display(&self) -> Size {
        self.display
    }

    /// Applies to frames annotated after the call.
    pub fn set_display(&mut self, display: Size) {
        self.display = display;
    }

    pub fn orientation(&self) -> ImageOrientation {
        self.orientation
    }

    /// Sends `image` to the detector. `on_annotation` runs once the detector
    /// answers with at least one region; failures and empty results produce
    /// no annotation.
    pub fn annotate(
        &mut self,
        image: &DecodedImage,
        on_annotation: impl FnOnce(Annotation) + Send + 'static,
    ) {
        let display = self.display;
        let transform = compute_transform(display, Some(image.size()));
        let sequence = image.sequence();

        self.detector.process(
            image,
            self.orientation,
            Box::new(move |result| match result {
                Ok(regions) if regions.is_empty() => {
                    log::debug!("No regions in frame {sequence}");
                }
                Ok(regions) => on_annotation(Annotation {
                    sequence,
                    display,
                    overlays: regions.iter().map(|r| transform.map_region(r)).collect(),
                }),
                Err(e) => log::debug!("Skipping annotation for frame {sequence}: {e}"),
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::domain::region_detector::{DetectionCompletion, DetectorError};
    use crate::shared::region::{DetectionRegion, Rect};
    use approx::assert_relative_eq;
    use std::sync::{Arc, Mutex};

    /// Answers every frame with a fixed result and remembers the orientation.
    struct FixedDetector {
        regions: Option<Vec<DetectionRegion>>,
        seen: Arc<Mutex<Vec<ImageOrientation>>>,
    }

    impl RegionDetector for FixedDetector {
        fn process(
            &mut self,
            image: &DecodedImage,
            orientation: ImageOrientation,
            completion: DetectionCompletion,
        ) {
            self.seen.lock().unwrap().push(orientation);
            match &self.regions {
                Some(regions) => completion(Ok(regions.clone())),
                None => completion(Err(DetectorError::Failed {
                    sequence: image.sequence(),
                    reason: "boom".into(),
                })),
            }
        }
    }

    fn annotator(
        regions: Option<Vec<DetectionRegion>>,
        position: FacingPosition,
    ) -> (FrameAnnotator, Arc<Mutex<Vec<ImageOrientation>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let detector = FixedDetector {
            regions,
            seen: seen.clone(),
        };
        (
            FrameAnnotator::new(Box::new(detector), position, Size::new(400.0, 800.0)),
            seen,
        )
    }

    fn collect(annotator: &mut FrameAnnotator, image: &DecodedImage) -> Vec<Annotation> {
        let out = Arc::new(Mutex::new(Vec::new()));
        let sink = out.clone();
        annotator.annotate(image, move |a| sink.lock().unwrap().push(a));
        let result = out.lock().unwrap().clone();
        result
    }

    fn square_image(sequence: u64) -> DecodedImage {
        DecodedImage::new(vec![0; 200 * 200 * 3], 200, 200, sequence)
    }

    #[test]
    fn test_maps_regions_into_display_space() {
        let region = DetectionRegion::new(Rect::new(50.0, 50.0, 10.0, 10.0), 0.9);
        let (mut annotator, _) = annotator(Some(vec![region]), FacingPosition::Back);

        let annotations = collect(&mut annotator, &square_image(3));

        assert_eq!(annotations.len(), 1);
        let annotation = &annotations[0];
        assert_eq!(annotation.sequence, 3);
        let rect = annotation.overlays[0].rect;
        assert_relative_eq!(rect.x, 100.0);
        assert_relative_eq!(rect.y, 300.0);
        assert_relative_eq!(rect.width, 20.0);
        assert_relative_eq!(rect.height, 20.0);
    }

    #[test]
    fn test_empty_result_produces_no_annotation() {
        let (mut annotator, _) = annotator(Some(vec![]), FacingPosition::Back);
        assert!(collect(&mut annotator, &square_image(0)).is_empty());
    }

    #[test]
    fn test_detector_failure_produces_no_annotation() {
        let (mut annotator, _) = annotator(None, FacingPosition::Back);
        assert!(collect(&mut annotator, &square_image(0)).is_empty());
    }

    #[test]
    fn test_front_camera_frames_are_sent_mirrored() {
        let (mut annotator, seen) = annotator(Some(vec![]), FacingPosition::Front);
        collect(&mut annotator, &square_image(0));
        assert_eq!(*seen.lock().unwrap(), vec![ImageOrientation::UpMirrored]);
    }

    #[test]
    fn test_display_change_applies_to_later_frames() {
        let region = DetectionRegion::new(Rect::new(0.0, 0.0, 100.0, 100.0), 1.0);
        let (mut annotator, _) = annotator(Some(vec![region]), FacingPosition::Back);

        annotator.set_display(Size::new(100.0, 100.0));
        let annotations = collect(&mut annotator, &square_image(0));

        assert_relative_eq!(annotations[0].overlays[0].rect.width, 50.0);
        assert_eq!(annotations[0].display, Size::new(100.0, 100.0));
    }

    #[test]
    fn test_annotation_serializes_to_json() {
        let region = DetectionRegion::new(Rect::new(50.0, 50.0, 10.0, 10.0), 0.5).with_label("face");
        let (mut annotator, _) = annotator(Some(vec![region]), FacingPosition::Back);

        let annotations = collect(&mut annotator, &square_image(1));
        let json = serde_json::to_value(&annotations[0]).unwrap();

        assert_eq!(json["sequence"], 1);
        assert_eq!(json["overlays"][0]["label"], "face");
        assert_eq!(json["overlays"][0]["rect"]["x"], 100.0);
    }
}
