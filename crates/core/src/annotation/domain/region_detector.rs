use thiserror::Error;

use crate::capture::domain::capture_device::FacingPosition;
use crate::shared::decoded_image::DecodedImage;
use crate::shared::region::DetectionRegion;

/// How the pixels of an image relate to its upright orientation, in the
/// EXIF sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOrientation {
    Up,
    UpMirrored,
    Down,
    DownMirrored,
    Left,
    LeftMirrored,
    Right,
    RightMirrored,
}

impl ImageOrientation {
    /// Orientation of frames from a portrait connection at `position`.
    /// Front-camera frames are mirrored.
    pub fn for_position(position: FacingPosition) -> Self {
        match position {
            FacingPosition::Front => ImageOrientation::UpMirrored,
            FacingPosition::Back => ImageOrientation::Up,
        }
    }
}

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("detector could not process frame {sequence}: {reason}")]
    Failed { sequence: u64, reason: String },
    #[error("detector is unavailable: {0}")]
    Unavailable(String),
}

/// Receives the detector's answer for one image, possibly on another thread.
pub type DetectionCompletion = Box<dyn FnOnce(Result<Vec<DetectionRegion>, DetectorError>) + Send>;

/// External region detector. Regions are reported in the pixel space of the
/// image that was passed in.
pub trait RegionDetector: Send {
    fn process(
        &mut self,
        image: &DecodedImage,
        orientation: ImageOrientation,
        completion: DetectionCompletion,
    );
}
