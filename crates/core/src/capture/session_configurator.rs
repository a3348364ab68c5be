use crate::capture::configuration_abort::ConfigurationAbort;
use crate::capture::device_selector::DeviceSelector;
use crate::capture::domain::authorization::AuthorizationState;
use crate::capture::domain::capture_backend::{
    CaptureBackend, ConnectionSettings, VideoDataOutput, VideoOrientation,
};
use crate::capture::domain::capture_device::{CaptureDevice, FacingPosition};
use crate::capture::domain::quality_preset::QualityPreset;

/// What a successful configuration put in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfiguredSession {
    /// `None` when no preset in the list was settable and the backend
    /// default was kept.
    pub preset: Option<QualityPreset>,
    pub device: CaptureDevice,
    pub connection: ConnectionSettings,
}

/// Builds the input → output graph of a capture session.
#[derive(Debug, Clone)]
pub struct SessionConfigurator {
    position: FacingPosition,
    presets: Vec<QualityPreset>,
}

impl SessionConfigurator {
    pub fn new(position: FacingPosition, presets: Vec<QualityPreset>) -> Self {
        Self { position, presets }
    }

    pub fn position(&self) -> FacingPosition {
        self.position
    }

    pub fn presets(&self) -> &[QualityPreset] {
        &self.presets
    }

    /// Wires `backend` for capture. Each step is a checked short-circuit; the
    /// first one that fails decides the abort. Nothing is started here.
    pub fn configure(
        &self,
        backend: &mut dyn CaptureBackend,
        permission: AuthorizationState,
        selector: &DeviceSelector,
        output: VideoDataOutput,
    ) -> Result<ConfiguredSession, ConfigurationAbort> {
        if permission != AuthorizationState::Authorized {
            return Err(ConfigurationAbort::PermissionDenied);
        }

        let preset = select_preset(backend, &self.presets);
        match preset {
            Some(preset) => log::info!("Capture preset: {preset}"),
            None => log::info!("No listed preset settable, keeping session default"),
        }

        let device = selector
            .select_device(self.position)
            .map_err(|e| ConfigurationAbort::DeviceUnavailable(e.0))?;

        let input = backend
            .open_input(&device)
            .map_err(|e| ConfigurationAbort::InputUnavailable(e.to_string()))?;
        if !backend.can_add_input(&input) {
            return Err(ConfigurationAbort::InputRejected);
        }
        backend.add_input(input);

        if !backend.can_add_output(&output) {
            return Err(ConfigurationAbort::OutputRejected);
        }
        log::debug!("Frame output delivers on '{}'", output.queue_label());
        backend.add_output(output);

        let capabilities = backend
            .connection()
            .ok_or(ConfigurationAbort::ConnectionUnavailable)?;
        if !capabilities.supports_orientation {
            return Err(ConfigurationAbort::OrientationUnsupported);
        }
        if !capabilities.supports_mirroring {
            return Err(ConfigurationAbort::MirroringUnsupported);
        }
        let connection = ConnectionSettings {
            orientation: VideoOrientation::Portrait,
            mirrored: self.position == FacingPosition::Front,
        };
        backend.apply_connection(connection);

        log::info!("Configured {} ({}) for capture", device.name, device.position);
        Ok(ConfiguredSession {
            preset,
            device,
            connection,
        })
    }
}

/// Sets the first preset in `presets` the backend accepts. Presets after the
/// chosen one are never queried.
pub fn select_preset(
    backend: &mut dyn CaptureBackend,
    presets: &[QualityPreset],
) -> Option<QualityPreset> {
    let preset = presets.iter().copied().find(|p| backend.can_set_preset(*p))?;
    backend.set_preset(preset);
    Some(preset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::domain::capture_backend::{ConnectionCapabilities, SampleBufferDelegate};
    use crate::capture::domain::capture_device::DeviceKind;
    use crate::capture::domain::quality_preset::DEFAULT_PRESETS;
    use crate::capture::domain::raw_frame_buffer::RawFrameBuffer;
    use crate::capture::infrastructure::device_catalogue::DeviceCatalogue;
    use crate::capture::infrastructure::synthetic_camera::SyntheticCamera;
    use crate::execution::serial_queue::SerialQueue;
    use rstest::rstest;

    struct Discard;

    impl SampleBufferDelegate for Discard {
        fn capture_output(&mut self, _buffer: &RawFrameBuffer<'_>) {}
    }

    fn sample_queue() -> SerialQueue<Box<dyn SampleBufferDelegate>> {
        SerialQueue::new("test.configure", Box::new(Discard) as Box<dyn SampleBufferDelegate>)
            .unwrap()
    }

    fn selector() -> DeviceSelector {
        DeviceSelector::new(Box::new(DeviceCatalogue::new(vec![
            CaptureDevice::new("front", FacingPosition::Front, DeviceKind::WideAngle),
            CaptureDevice::new("back", FacingPosition::Back, DeviceKind::WideAngle),
        ])))
    }

    fn configure(
        camera: &mut SyntheticCamera,
        position: FacingPosition,
        permission: AuthorizationState,
    ) -> Result<ConfiguredSession, ConfigurationAbort> {
        let queue = sample_queue();
        SessionConfigurator::new(position, DEFAULT_PRESETS.to_vec()).configure(
            camera,
            permission,
            &selector(),
            VideoDataOutput::new(queue.handle()),
        )
    }

    #[test]
    fn test_front_camera_is_portrait_and_mirrored() {
        let mut camera = SyntheticCamera::new();
        let handle = camera.handle();

        let configured =
            configure(&mut camera, FacingPosition::Front, AuthorizationState::Authorized).unwrap();

        assert_eq!(configured.device.id, "front");
        assert_eq!(configured.preset, Some(QualityPreset::Hd1280x720));
        let expected = ConnectionSettings {
            orientation: VideoOrientation::Portrait,
            mirrored: true,
        };
        assert_eq!(configured.connection, expected);
        assert_eq!(handle.connection_settings(), Some(expected));
        assert_eq!(handle.input_device().map(|d| d.id), Some("front".to_string()));
        assert!(handle.has_output());
        assert!(!handle.is_running());
    }

    #[test]
    fn test_back_camera_is_not_mirrored() {
        let mut camera = SyntheticCamera::new();
        let configured =
            configure(&mut camera, FacingPosition::Back, AuthorizationState::Authorized).unwrap();
        assert!(!configured.connection.mirrored);
    }

    #[rstest]
    #[case::all(&QualityPreset::ALL, Some(QualityPreset::Hd1280x720))]
    #[case::no_hd(&[QualityPreset::High, QualityPreset::Low], Some(QualityPreset::High))]
    #[case::low_only(&[QualityPreset::Low], Some(QualityPreset::Low))]
    #[case::none(&[QualityPreset::Photo], None)]
    fn test_selects_first_settable_preset(
        #[case] supported: &[QualityPreset],
        #[case] expected: Option<QualityPreset>,
    ) {
        let mut camera = SyntheticCamera::new().with_supported_presets(supported);
        let handle = camera.handle();

        let selected = select_preset(&mut camera, &DEFAULT_PRESETS);

        assert_eq!(selected, expected);
        assert_eq!(handle.preset(), expected);
    }

    #[test]
    fn test_never_queries_past_the_first_settable_preset() {
        let mut camera = SyntheticCamera::new()
            .with_supported_presets(&[QualityPreset::High, QualityPreset::Medium]);
        let handle = camera.handle();

        select_preset(&mut camera, &DEFAULT_PRESETS);

        assert_eq!(
            handle.preset_queries(),
            vec![QualityPreset::Hd1280x720, QualityPreset::High]
        );
    }

    #[test]
    fn test_no_settable_preset_is_not_an_abort() {
        let mut camera = SyntheticCamera::new().with_supported_presets(&[]);
        let configured =
            configure(&mut camera, FacingPosition::Back, AuthorizationState::Authorized).unwrap();
        assert_eq!(configured.preset, None);
    }

    #[rstest]
    #[case::undetermined(AuthorizationState::Undetermined)]
    #[case::denied(AuthorizationState::Denied)]
    fn test_requires_authorization(#[case] permission: AuthorizationState) {
        let mut camera = SyntheticCamera::new();
        let handle = camera.handle();

        let result = configure(&mut camera, FacingPosition::Front, permission);

        assert_eq!(result, Err(ConfigurationAbort::PermissionDenied));
        assert!(handle.preset_queries().is_empty());
        assert!(handle.input_device().is_none());
    }

    #[test]
    fn test_missing_device_aborts() {
        let mut camera = SyntheticCamera::new();
        let queue = sample_queue();
        let selector = DeviceSelector::new(Box::new(DeviceCatalogue::default()));

        let result = SessionConfigurator::new(FacingPosition::Back, DEFAULT_PRESETS.to_vec())
            .configure(
                &mut camera,
                AuthorizationState::Authorized,
                &selector,
                VideoDataOutput::new(queue.handle()),
            );

        assert_eq!(result, Err(ConfigurationAbort::DeviceUnavailable(FacingPosition::Back)));
    }

    #[rstest]
    #[case::open_fails(
        SyntheticCamera::new().failing_open("busy"),
        ConfigurationAbort::InputUnavailable("device front is in use by another client".into())
    )]
    #[case::input_rejected(SyntheticCamera::new().rejecting_input(), ConfigurationAbort::InputRejected)]
    #[case::output_rejected(SyntheticCamera::new().rejecting_output(), ConfigurationAbort::OutputRejected)]
    #[case::no_connection(
        SyntheticCamera::new().with_capabilities(None),
        ConfigurationAbort::ConnectionUnavailable
    )]
    #[case::no_orientation(
        SyntheticCamera::new().with_capabilities(Some(ConnectionCapabilities {
            supports_orientation: false,
            supports_mirroring: true,
        })),
        ConfigurationAbort::OrientationUnsupported
    )]
    #[case::no_mirroring(
        SyntheticCamera::new().with_capabilities(Some(ConnectionCapabilities {
            supports_orientation: true,
            supports_mirroring: false,
        })),
        ConfigurationAbort::MirroringUnsupported
    )]
    fn test_capability_failures_abort(
        #[case] mut camera: SyntheticCamera,
        #[case] expected: ConfigurationAbort,
    ) {
        let handle = camera.handle();

        let result = configure(&mut camera, FacingPosition::Front, AuthorizationState::Authorized);

        assert_eq!(result, Err(expected));
        assert!(handle.connection_settings().is_none());
    }
}
