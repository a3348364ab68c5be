use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;
use image::RgbImage;

use crate::capture::domain::capture_backend::{
    BackendError, CaptureBackend, ConnectionCapabilities, ConnectionSettings, DeviceInput,
    VideoDataOutput, VideoOrientation,
};
use crate::capture::domain::capture_device::{CaptureDevice, DeviceKind, FacingPosition};
use crate::capture::domain::quality_preset::QualityPreset;
use crate::capture::domain::raw_frame_buffer::{CapturedFrame, PixelFormat};
use crate::capture::infrastructure::device_catalogue::DeviceCatalogue;
use crate::shared::constants::{DEFAULT_FRAME_INTERVAL_MS, IMAGE_EXTENSIONS};

/// Capture backend that replays the image files of a directory as camera
/// frames, in file-name order.
///
/// Frames are produced on a dedicated capture thread paced at a fixed
/// interval. A file that fails to decode is submitted as a frame without an
/// image buffer, so it shows up downstream as a dropped frame. The files
/// have a fixed resolution, so only the non-explicit presets are settable.
pub struct ImageFolderCamera {
    files: Vec<PathBuf>,
    device: CaptureDevice,
    interval: Duration,
    max_frames: Option<usize>,
    finished: Option<Sender<usize>>,
    preset: Option<QualityPreset>,
    input: Option<DeviceInput>,
    output: Option<VideoDataOutput>,
    connection: Option<ConnectionSettings>,
    capture: Option<CaptureLoop>,
}

struct CaptureLoop {
    stop_signal: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

struct LoopPlan {
    files: Vec<PathBuf>,
    interval: Duration,
    connection: ConnectionSettings,
    output: VideoDataOutput,
    finished: Option<Sender<usize>>,
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

impl ImageFolderCamera {
    /// Lists the image files in `dir`. The camera presents itself as a
    /// single wide-angle device facing `position`.
    pub fn open(dir: &Path, position: FacingPosition) -> std::io::Result<Self> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image_file(path))
            .collect();
        files.sort();
        log::info!("Found {} image(s) in {}", files.len(), dir.display());

        let id = format!("folder:{}", dir.display());
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| id.clone());
        let device = CaptureDevice::new(id, position, DeviceKind::WideAngle).with_name(name);
        Ok(Self {
            files,
            device,
            interval: Duration::from_millis(DEFAULT_FRAME_INTERVAL_MS),
            max_frames: None,
            finished: None,
            preset: None,
            input: None,
            output: None,
            connection: None,
            capture: None,
        })
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    /// Receives the number of frames submitted once the capture thread has
    /// gone through every file.
    pub fn on_finished(mut self, finished: Sender<usize>) -> Self {
        self.finished = Some(finished);
        self
    }

    pub fn device(&self) -> &CaptureDevice {
        &self.device
    }

    /// Discovery that reports this camera's device.
    pub fn catalogue(&self) -> DeviceCatalogue {
        DeviceCatalogue::new(vec![self.device.clone()])
    }

    /// Number of frames a full run submits.
    pub fn frame_count(&self) -> usize {
        match self.max_frames {
            Some(max) => self.files.len().min(max),
            None => self.files.len(),
        }
    }
}

impl CaptureBackend for ImageFolderCamera {
    fn can_set_preset(&self, preset: QualityPreset) -> bool {
        preset.resolution().is_none()
    }

    fn set_preset(&mut self, preset: QualityPreset) {
        self.preset = Some(preset);
    }

    fn preset(&self) -> Option<QualityPreset> {
        self.preset
    }

    fn open_input(&mut self, device: &CaptureDevice) -> Result<DeviceInput, BackendError> {
        if device.id != self.device.id {
            return Err(BackendError::DeviceDisconnected(device.id.clone()));
        }
        Ok(DeviceInput::new(device.clone()))
    }

    fn can_add_input(&self, _input: &DeviceInput) -> bool {
        self.input.is_none()
    }

    fn add_input(&mut self, input: DeviceInput) {
        self.input = Some(input);
    }

    fn can_add_output(&self, _output: &VideoDataOutput) -> bool {
        self.output.is_none()
    }

    fn add_output(&mut self, output: VideoDataOutput) {
        self.output = Some(output);
    }

    fn connection(&self) -> Option<ConnectionCapabilities> {
        if self.input.is_none() || self.output.is_none() {
            return None;
        }
        Some(ConnectionCapabilities {
            supports_orientation: true,
            supports_mirroring: true,
        })
    }

    fn apply_connection(&mut self, settings: ConnectionSettings) {
        self.connection = Some(settings);
    }

    fn start_running(&mut self) {
        if self.capture.is_some() {
            return;
        }
        let Some(output) = self.output.clone() else {
            log::warn!("Image folder camera started without an output");
            return;
        };
        let plan = LoopPlan {
            files: self.files.iter().take(self.frame_count()).cloned().collect(),
            interval: self.interval,
            connection: self.connection.unwrap_or(ConnectionSettings {
                orientation: VideoOrientation::Portrait,
                mirrored: false,
            }),
            output,
            finished: self.finished.clone(),
        };

        let stop_signal = Arc::new(AtomicBool::new(false));
        let loop_signal = stop_signal.clone();
        match thread::Builder::new()
            .name("framecap.image-folder".to_string())
            .spawn(move || run_capture_loop(plan, &loop_signal))
        {
            Ok(thread) => {
                self.capture = Some(CaptureLoop {
                    stop_signal,
                    thread: Some(thread),
                });
            }
            Err(e) => log::error!("Failed to start image folder capture thread: {e}"),
        }
    }

    fn stop_running(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
    }

    fn is_running(&self) -> bool {
        self.capture.is_some()
    }
}

impl CaptureLoop {
    fn stop(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Image folder capture thread panicked");
            }
        }
    }
}

impl Drop for ImageFolderCamera {
    fn drop(&mut self) {
        self.stop_running();
    }
}

fn run_capture_loop(plan: LoopPlan, stop_signal: &AtomicBool) {
    let mut submitted = 0;
    for (index, path) in plan.files.iter().enumerate() {
        if stop_signal.load(Ordering::SeqCst) {
            log::debug!("Image folder capture stopped after {submitted} frame(s)");
            return;
        }
        let sequence = index as u64;
        let frame = load_frame(sequence, path, plan.connection)
            .with_timestamp(plan.interval * index as u32);
        if !plan.output.submit(frame) {
            log::debug!("Sample queue closed, ending image folder capture");
            return;
        }
        submitted += 1;
        thread::sleep(plan.interval);
    }
    if let Some(finished) = plan.finished {
        let _ = finished.send(submitted);
    }
}

fn load_frame(sequence: u64, path: &Path, connection: ConnectionSettings) -> CapturedFrame {
    let img = match image::open(path) {
        Ok(img) => img.to_rgb8(),
        Err(e) => {
            log::warn!("Could not decode {}: {e}", path.display());
            return CapturedFrame::empty(sequence);
        }
    };
    let img = apply_connection(img, connection);
    let (width, height) = img.dimensions();
    CapturedFrame::packed(sequence, PixelFormat::Rgb24, width, height, img.into_raw())
}

/// Rotates and mirrors an upright source image the way the connection would.
fn apply_connection(img: RgbImage, connection: ConnectionSettings) -> RgbImage {
    let img = match connection.orientation {
        VideoOrientation::Portrait => img,
        VideoOrientation::PortraitUpsideDown => image::imageops::rotate180(&img),
        VideoOrientation::LandscapeLeft => image::imageops::rotate270(&img),
        VideoOrientation::LandscapeRight => image::imageops::rotate90(&img),
    };
    if connection.mirrored {
        image::imageops::flip_horizontal(&img)
    } else {
        img
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::domain::capture_backend::SampleBufferDelegate;
    use crate::capture::domain::raw_frame_buffer::RawFrameBuffer;
    use crate::execution::serial_queue::SerialQueue;
    use rstest::rstest;

    #[derive(Debug, PartialEq)]
    struct Seen {
        sequence: u64,
        size: Option<(u32, u32)>,
        first_pixel: Option<[u8; 3]>,
    }

    struct Recorder {
        tx: Sender<Seen>,
    }

    impl SampleBufferDelegate for Recorder {
        fn capture_output(&mut self, buffer: &RawFrameBuffer<'_>) {
            let plane = buffer.plane();
            let _ = self.tx.send(Seen {
                sequence: buffer.sequence(),
                size: plane.map(|p| (p.width, p.height)),
                first_pixel: plane.map(|p| [p.data[0], p.data[1], p.data[2]]),
            });
        }
    }

    fn write_image(dir: &Path, name: &str, width: u32, height: u32) {
        let mut img = RgbImage::new(width, height);
        for (x, _, pixel) in img.enumerate_pixels_mut() {
            *pixel = image::Rgb([x as u8 * 10, 100, 200]);
        }
        img.save(dir.join(name)).unwrap();
    }

    fn run(
        camera: ImageFolderCamera,
        connection: ConnectionSettings,
    ) -> (Vec<Seen>, usize) {
        let (seen_tx, seen_rx) = crossbeam_channel::unbounded();
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let queue = SerialQueue::new(
            "test.folder-sample",
            Box::new(Recorder { tx: seen_tx }) as Box<dyn SampleBufferDelegate>,
        )
        .unwrap();

        let mut camera = camera
            .with_interval(Duration::from_millis(1))
            .on_finished(done_tx);
        let device = camera.device().clone();
        let input = camera.open_input(&device).unwrap();
        camera.add_input(input);
        camera.add_output(VideoDataOutput::new(queue.handle()));
        camera.apply_connection(connection);
        camera.start_running();

        let submitted = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        queue.sync(|_| ());
        camera.stop_running();
        (seen_rx.try_iter().collect(), submitted)
    }

    fn upright() -> ConnectionSettings {
        ConnectionSettings {
            orientation: VideoOrientation::Portrait,
            mirrored: false,
        }
    }

    #[test]
    fn test_replays_images_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "b.png", 4, 2);
        write_image(dir.path(), "a.png", 3, 5);
        std::fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

        let camera = ImageFolderCamera::open(dir.path(), FacingPosition::Back).unwrap();
        assert_eq!(camera.frame_count(), 2);
        let (seen, submitted) = run(camera, upright());

        assert_eq!(submitted, 2);
        assert_eq!(
            seen,
            vec![
                Seen { sequence: 0, size: Some((3, 5)), first_pixel: Some([0, 100, 200]) },
                Seen { sequence: 1, size: Some((4, 2)), first_pixel: Some([0, 100, 200]) },
            ]
        );
    }

    #[test]
    fn test_undecodable_file_becomes_empty_frame() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "0.png", 2, 2);
        std::fs::write(dir.path().join("1.png"), b"garbage").unwrap();

        let camera = ImageFolderCamera::open(dir.path(), FacingPosition::Back).unwrap();
        let (seen, _) = run(camera, upright());

        assert_eq!(seen.len(), 2);
        assert!(seen[0].size.is_some());
        assert_eq!(seen[1].sequence, 1);
        assert!(seen[1].size.is_none());
    }

    #[test]
    fn test_mirrored_connection_flips_frames() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "0.png", 3, 1);

        let camera = ImageFolderCamera::open(dir.path(), FacingPosition::Front).unwrap();
        let mirrored = ConnectionSettings {
            orientation: VideoOrientation::Portrait,
            mirrored: true,
        };
        let (seen, _) = run(camera, mirrored);

        // The rightmost source column (x = 2) is now first.
        assert_eq!(seen[0].first_pixel, Some([20, 100, 200]));
    }

    #[test]
    fn test_landscape_connection_rotates_frames() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "0.png", 4, 2);

        let camera = ImageFolderCamera::open(dir.path(), FacingPosition::Back).unwrap();
        let landscape = ConnectionSettings {
            orientation: VideoOrientation::LandscapeRight,
            mirrored: false,
        };
        let (seen, _) = run(camera, landscape);

        assert_eq!(seen[0].size, Some((2, 4)));
    }

    #[test]
    fn test_max_frames_limits_replay() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["0.png", "1.png", "2.png"] {
            write_image(dir.path(), name, 1, 1);
        }
        let camera = ImageFolderCamera::open(dir.path(), FacingPosition::Back)
            .unwrap()
            .with_max_frames(2);
        let (seen, submitted) = run(camera, upright());
        assert_eq!(submitted, 2);
        assert_eq!(seen.len(), 2);
    }

    #[rstest]
    #[case(QualityPreset::Hd1920x1080, false)]
    #[case(QualityPreset::Hd1280x720, false)]
    #[case(QualityPreset::High, true)]
    #[case(QualityPreset::Low, true)]
    fn test_only_fixed_resolution_free_presets_are_settable(
        #[case] preset: QualityPreset,
        #[case] expected: bool,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let camera = ImageFolderCamera::open(dir.path(), FacingPosition::Back).unwrap();
        assert_eq!(camera.can_set_preset(preset), expected);
    }

    #[test]
    fn test_catalogue_reports_single_wide_angle_device() {
        let dir = tempfile::tempdir().unwrap();
        let camera = ImageFolderCamera::open(dir.path(), FacingPosition::Front).unwrap();
        let catalogue = camera.catalogue();
        assert_eq!(catalogue.len(), 1);
        assert_eq!(camera.device().kind, DeviceKind::WideAngle);
        assert_eq!(camera.device().position, FacingPosition::Front);
    }

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("a/b.PNG")));
        assert!(is_image_file(Path::new("x.jpeg")));
        assert!(!is_image_file(Path::new("x.mp4")));
        assert!(!is_image_file(Path::new("noext")));
    }

    #[test]
    fn test_open_missing_directory_fails() {
        assert!(ImageFolderCamera::open(Path::new("/nonexistent/frames"), FacingPosition::Back).is_err());
    }
}
