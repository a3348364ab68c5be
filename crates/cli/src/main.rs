use std::path::{Path, PathBuf};
use std::process;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;

use framecap_core::annotation::domain::region_detector::RegionDetector;
use framecap_core::annotation::frame_annotator::{Annotation, FrameAnnotator};
use framecap_core::annotation::infrastructure::cached_region_detector::CachedRegionDetector;
use framecap_core::capture::capture_session::{CaptureComponents, CaptureSession, SessionState};
use framecap_core::capture::domain::capture_device::FacingPosition;
use framecap_core::capture::domain::quality_preset::QualityPreset;
use framecap_core::capture::infrastructure::image_folder_camera::ImageFolderCamera;
use framecap_core::capture::infrastructure::scripted_permission::ScriptedPermission;
use framecap_core::execution::manual_queue::ManualQueue;
use framecap_core::pipeline::pipeline_config::PipelineConfig;
use framecap_core::pipeline::pipeline_logger::StatsPipelineLogger;
use framecap_core::shared::constants::DEFAULT_FRAME_INTERVAL_MS;
use framecap_core::shared::decoded_image::DecodedImage;

/// Replays a folder of images through the camera capture pipeline and prints
/// one JSON annotation per frame with detections.
#[derive(Parser)]
#[command(name = "framecap")]
struct Cli {
    /// Directory of image files, replayed in file-name order.
    frames: PathBuf,

    /// Pipeline config file (JSON). Flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Camera facing position: front or back.
    #[arg(long)]
    position: Option<FacingPosition>,

    /// Quality presets to try, highest first (comma-separated).
    #[arg(long, value_delimiter = ',')]
    presets: Option<Vec<QualityPreset>>,

    /// Display size the overlays are positioned for, as WIDTHxHEIGHT.
    #[arg(long)]
    display: Option<String>,

    /// Pre-computed detections (JSON keyed by frame number).
    #[arg(long)]
    detections: Option<PathBuf>,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<usize>,

    /// Delay between frames in milliseconds.
    #[arg(long, default_value_t = DEFAULT_FRAME_INTERVAL_MS)]
    interval_ms: u64,

    /// Simulate the user declining camera access.
    #[arg(long)]
    deny_permission: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;
    let config = build_config(&cli)?;

    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    let mut camera = ImageFolderCamera::open(&cli.frames, config.position)?
        .with_interval(Duration::from_millis(cli.interval_ms))
        .on_finished(done_tx);
    if let Some(max) = cli.max_frames {
        camera = camera.with_max_frames(max);
    }
    let frame_count = camera.frame_count();

    let detector: Box<dyn RegionDetector> = match &cli.detections {
        Some(path) => Box::new(CachedRegionDetector::load(path)?),
        None => Box::new(CachedRegionDetector::new(Arc::default())),
    };
    let mut annotator = FrameAnnotator::new(detector, config.position, config.display());
    let consumer = move |image: DecodedImage| annotator.annotate(&image, print_annotation);

    let components = CaptureComponents {
        permission: Box::new(ScriptedPermission::answering(!cli.deny_permission)),
        discovery: Box::new(camera.catalogue()),
        backend: Box::new(camera),
    };
    let stats = Arc::new(Mutex::new(StatsPipelineLogger::default()));
    let (queue, executor) = ManualQueue::new();

    let session = CaptureSession::builder(components)
        .options(config.session_options())
        .delivery(Arc::new(executor))
        .consumer(consumer)
        .logger(stats.clone())
        .start()?;

    // Frames are delivered on this thread while the camera replays the folder.
    let budget = frame_budget(cli.interval_ms, frame_count);
    let mut finished = false;
    let completed = queue.run_until(budget, || {
        finished |= done_rx.try_recv().is_ok();
        finished || session.abort_reason().is_some()
    });
    if !completed {
        log::warn!("Timed out waiting for the camera to finish");
    }

    session.flush();
    queue.run_pending();

    let abort = session.abort_reason();
    let state = session.state();
    session.stop();
    queue.run_pending();

    if let Some(abort) = abort {
        return Err(format!("capture did not start: {abort}").into());
    }
    if state != SessionState::Running {
        log::warn!("Capture session ended in state {state:?}");
    }
    let stats = stats.lock().unwrap_or_else(|e| e.into_inner());
    log::info!(
        "Processed {} frame(s), {} dropped",
        stats.converted(),
        stats.dropped()
    );
    Ok(())
}

/// Time allowed for the camera to replay `frame_count` frames, saturating
/// instead of overflowing for huge folders or intervals.
fn frame_budget(interval_ms: u64, frame_count: usize) -> Duration {
    let frames = u64::try_from(frame_count).unwrap_or(u64::MAX);
    Duration::from_millis(interval_ms.saturating_mul(frames))
        .saturating_add(Duration::from_secs(10))
}

fn print_annotation(annotation: Annotation) {
    match serde_json::to_string(&annotation) {
        Ok(line) => println!("{line}"),
        Err(e) => log::error!("Failed to serialize annotation {}: {e}", annotation.sequence),
    }
}

fn build_config(cli: &Cli) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(position) = cli.position {
        config.position = position;
    }
    if let Some(presets) = &cli.presets {
        config.presets = presets.clone();
    }
    if let Some(display) = &cli.display {
        let (width, height) = parse_display(display)?;
        config.display_width = width;
        config.display_height = height;
    }
    config.validate()?;
    Ok(config)
}

fn parse_display(value: &str) -> Result<(f64, f64), String> {
    let invalid = || format!("Display must be WIDTHxHEIGHT, got '{value}'");
    let (w, h) = value.split_once(['x', 'X']).ok_or_else(invalid)?;
    let width: f64 = w.trim().parse().map_err(|_| invalid())?;
    let height: f64 = h.trim().parse().map_err(|_| invalid())?;
    if width <= 0.0 || height <= 0.0 {
        return Err(format!("Display size must be positive, got '{value}'"));
    }
    Ok((width, height))
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.frames.is_dir() {
        return Err(format!("Frames directory not found: {}", cli.frames.display()).into());
    }
    if let Some(path) = &cli.detections {
        ensure_file(path, "Detections")?;
    }
    if let Some(path) = &cli.config {
        ensure_file(path, "Config")?;
    }
    if cli.max_frames == Some(0) {
        return Err("--max-frames must be at least 1".into());
    }
    if let Some(presets) = &cli.presets {
        if presets.is_empty() {
            return Err("--presets needs at least one preset".into());
        }
    }
    Ok(())
}

fn ensure_file(path: &Path, what: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !path.is_file() {
        return Err(format!("{what} file not found: {}", path.display()).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_display() {
        assert_eq!(parse_display("400x800").unwrap(), (400.0, 800.0));
        assert_eq!(parse_display("1080X1920").unwrap(), (1080.0, 1920.0));
        assert!(parse_display("400").is_err());
        assert!(parse_display("0x800").is_err());
        assert!(parse_display("axb").is_err());
    }

    #[test]
    fn test_frame_budget() {
        assert_eq!(frame_budget(33, 3), Duration::from_millis(99 + 10_000));
        assert_eq!(
            frame_budget(u64::MAX, usize::MAX),
            Duration::from_millis(u64::MAX).saturating_add(Duration::from_secs(10))
        );
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "framecap",
            "frames",
            "--position",
            "back",
            "--presets",
            "high,low",
            "--display",
            "100x200",
        ]);

        let config = build_config(&cli).unwrap();

        assert_eq!(config.position, FacingPosition::Back);
        assert_eq!(config.presets, vec![QualityPreset::High, QualityPreset::Low]);
        assert_eq!((config.display_width, config.display_height), (100.0, 200.0));
    }

    #[test]
    fn test_rejects_unknown_preset() {
        let result = Cli::try_parse_from(["framecap", "frames", "--presets", "ultra"]);
        assert!(result.is_err());
    }
}
