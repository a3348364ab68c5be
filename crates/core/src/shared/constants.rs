pub const SESSION_QUEUE_LABEL: &str = "framecap.session";
pub const SAMPLE_QUEUE_LABEL: &str = "framecap.sample-buffer";
pub const DELIVERY_QUEUE_LABEL: &str = "framecap.delivery";

/// Display surface used when no configuration overrides it (portrait phone-sized).
pub const DEFAULT_DISPLAY_WIDTH: f64 = 400.0;
pub const DEFAULT_DISPLAY_HEIGHT: f64 = 800.0;

/// Pacing for file-backed cameras (~30 fps).
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 33;

/// Progress is logged every this many converted frames.
pub const PROGRESS_LOG_INTERVAL: usize = 30;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
