use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::capture::domain::capture_backend::{
    BackendError, CaptureBackend, ConnectionCapabilities, ConnectionSettings, DeviceInput,
    VideoDataOutput,
};
use crate::capture::domain::capture_device::CaptureDevice;
use crate::capture::domain::quality_preset::QualityPreset;
use crate::capture::domain::raw_frame_buffer::{CapturedFrame, PixelFormat};

/// In-memory capture backend. Frames are pushed in through a
/// [`SyntheticCameraHandle`] instead of coming from hardware.
///
/// Each capability check can be switched off to reproduce a device that
/// rejects part of the configuration.
pub struct SyntheticCamera {
    state: Arc<Mutex<SyntheticState>>,
}

/// Test/driver side of a [`SyntheticCamera`]: injects frames and inspects
/// what the session configured.
#[derive(Clone)]
pub struct SyntheticCameraHandle {
    state: Arc<Mutex<SyntheticState>>,
}

struct SyntheticState {
    supported_presets: Vec<QualityPreset>,
    preset: Option<QualityPreset>,
    preset_queries: Vec<QualityPreset>,
    open_error: Option<String>,
    accept_input: bool,
    accept_output: bool,
    capabilities: Option<ConnectionCapabilities>,
    input: Option<DeviceInput>,
    output: Option<VideoDataOutput>,
    connection: Option<ConnectionSettings>,
    running: bool,
    start_count: usize,
}

fn lock(state: &Mutex<SyntheticState>) -> MutexGuard<'_, SyntheticState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SyntheticCamera {
    /// A camera that supports every preset and accepts the whole graph.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SyntheticState {
                supported_presets: QualityPreset::ALL.to_vec(),
                preset: None,
                preset_queries: Vec::new(),
                open_error: None,
                accept_input: true,
                accept_output: true,
                capabilities: Some(ConnectionCapabilities {
                    supports_orientation: true,
                    supports_mirroring: true,
                }),
                input: None,
                output: None,
                connection: None,
                running: false,
                start_count: 0,
            })),
        }
    }

    pub fn handle(&self) -> SyntheticCameraHandle {
        SyntheticCameraHandle {
            state: self.state.clone(),
        }
    }

    pub fn with_supported_presets(self, presets: &[QualityPreset]) -> Self {
        lock(&self.state).supported_presets = presets.to_vec();
        self
    }

    pub fn failing_open(self, reason: &str) -> Self {
        lock(&self.state).open_error = Some(reason.to_string());
        self
    }

    pub fn rejecting_input(self) -> Self {
        lock(&self.state).accept_input = false;
        self
    }

    pub fn rejecting_output(self) -> Self {
        lock(&self.state).accept_output = false;
        self
    }

    pub fn with_capabilities(self, capabilities: Option<ConnectionCapabilities>) -> Self {
        lock(&self.state).capabilities = capabilities;
        self
    }
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for SyntheticCamera {
    fn can_set_preset(&self, preset: QualityPreset) -> bool {
        let mut state = lock(&self.state);
        state.preset_queries.push(preset);
        state.supported_presets.contains(&preset)
    }

    fn set_preset(&mut self, preset: QualityPreset) {
        lock(&self.state).preset = Some(preset);
    }

    fn preset(&self) -> Option<QualityPreset> {
        lock(&self.state).preset
    }

    fn open_input(&mut self, device: &CaptureDevice) -> Result<DeviceInput, BackendError> {
        match &lock(&self.state).open_error {
            Some(reason) if reason == "busy" => Err(BackendError::DeviceBusy(device.id.clone())),
            Some(reason) => Err(BackendError::Other(reason.clone())),
            None => Ok(DeviceInput::new(device.clone())),
        }
    }

    fn can_add_input(&self, _input: &DeviceInput) -> bool {
        let state = lock(&self.state);
        state.accept_input && state.input.is_none()
    }

    fn add_input(&mut self, input: DeviceInput) {
        lock(&self.state).input = Some(input);
    }

    fn can_add_output(&self, _output: &VideoDataOutput) -> bool {
        let state = lock(&self.state);
        state.accept_output && state.output.is_none()
    }

    fn add_output(&mut self, output: VideoDataOutput) {
        lock(&self.state).output = Some(output);
    }

    fn connection(&self) -> Option<ConnectionCapabilities> {
        let state = lock(&self.state);
        if state.input.is_none() || state.output.is_none() {
            return None;
        }
        state.capabilities
    }

    fn apply_connection(&mut self, settings: ConnectionSettings) {
        lock(&self.state).connection = Some(settings);
    }

    fn start_running(&mut self) {
        let mut state = lock(&self.state);
        if !state.running {
            state.running = true;
            state.start_count += 1;
        }
    }

    fn stop_running(&mut self) {
        lock(&self.state).running = false;
    }

    fn is_running(&self) -> bool {
        lock(&self.state).running
    }
}

impl SyntheticCameraHandle {
    /// Submits `frame` as if the hardware had captured it. Frames are only
    /// accepted while the session is running with an output attached.
    pub fn inject(&self, frame: CapturedFrame) -> bool {
        let output = {
            let state = lock(&self.state);
            if !state.running {
                return false;
            }
            state.output.clone()
        };
        match output {
            Some(output) => output.submit(frame),
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.state).running
    }

    pub fn start_count(&self) -> usize {
        lock(&self.state).start_count
    }

    pub fn preset(&self) -> Option<QualityPreset> {
        lock(&self.state).preset
    }

    /// Presets the configurator asked about, in query order.
    pub fn preset_queries(&self) -> Vec<QualityPreset> {
        lock(&self.state).preset_queries.clone()
    }

    pub fn input_device(&self) -> Option<CaptureDevice> {
        lock(&self.state).input.as_ref().map(|i| i.device().clone())
    }

    pub fn has_output(&self) -> bool {
        lock(&self.state).output.is_some()
    }

    pub fn connection_settings(&self) -> Option<ConnectionSettings> {
        lock(&self.state).connection
    }
}

/// Deterministic gradient frame in `format`, for tests and demos.
///
/// Pixel `(x, y)` has red `x * 255 / width`, green `y * 255 / height` and
/// blue `sequence % 256`. YUV formats carry the luma of that colour with
/// neutral chroma.
pub fn test_pattern(sequence: u64, format: PixelFormat, width: u32, height: u32) -> CapturedFrame {
    let w = width as usize;
    let h = height as usize;
    let rgb_at = |x: usize, y: usize| -> [u8; 3] {
        [
            (x * 255 / w.max(1)) as u8,
            (y * 255 / h.max(1)) as u8,
            (sequence % 256) as u8,
        ]
    };
    let luma = |[r, g, b]: [u8; 3]| -> u8 {
        (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as u8
    };

    let stride = format.min_stride(width);
    let mut data = Vec::with_capacity(format.required_len(width, height, stride).unwrap_or(0));
    match format {
        PixelFormat::Rgb24 | PixelFormat::Rgba32 | PixelFormat::Bgra32 | PixelFormat::Gray8 => {
            for y in 0..h {
                for x in 0..w {
                    let [r, g, b] = rgb_at(x, y);
                    match format {
                        PixelFormat::Rgb24 => data.extend_from_slice(&[r, g, b]),
                        PixelFormat::Rgba32 => data.extend_from_slice(&[r, g, b, 255]),
                        PixelFormat::Bgra32 => data.extend_from_slice(&[b, g, r, 255]),
                        _ => data.push(luma([r, g, b])),
                    }
                }
            }
        }
        PixelFormat::Nv12 => {
            for y in 0..h {
                for x in 0..stride {
                    data.push(luma(rgb_at(x.min(w - 1), y)));
                }
            }
            data.resize(data.len() + stride * h.div_ceil(2), 128);
        }
        PixelFormat::Yuyv => {
            for y in 0..h {
                for pair in 0..w.div_ceil(2) {
                    let y0 = luma(rgb_at(pair * 2, y));
                    let y1 = luma(rgb_at((pair * 2 + 1).min(w - 1), y));
                    data.extend_from_slice(&[y0, 128, y1, 128]);
                }
            }
        }
    }
    CapturedFrame::new(sequence, format, width, height, stride, data)
}
