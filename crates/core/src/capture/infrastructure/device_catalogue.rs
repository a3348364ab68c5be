use crate::capture::domain::capture_device::{
    CaptureDevice, DeviceDiscovery, FacingPosition, MediaKind,
};

/// Fixed list of devices, filtered by position on every query.
#[derive(Debug, Clone, Default)]
pub struct DeviceCatalogue {
    devices: Vec<CaptureDevice>,
}

impl DeviceCatalogue {
    pub fn new(devices: Vec<CaptureDevice>) -> Self {
        Self { devices }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl DeviceDiscovery for DeviceCatalogue {
    fn devices(&self, _media: MediaKind, position: FacingPosition) -> Vec<CaptureDevice> {
        self.devices
            .iter()
            .filter(|d| d.position == position)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::domain::capture_device::DeviceKind;

    #[test]
    fn test_filters_by_position_preserving_order() {
        let catalogue = DeviceCatalogue::new(vec![
            CaptureDevice::new("a", FacingPosition::Front, DeviceKind::WideAngle),
            CaptureDevice::new("b", FacingPosition::Back, DeviceKind::WideAngle),
            CaptureDevice::new("c", FacingPosition::Front, DeviceKind::Telephoto),
        ]);

        let ids: Vec<_> = catalogue
            .devices(MediaKind::Video, FacingPosition::Front)
            .into_iter()
            .map(|d| d.id)
            .collect();

        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(catalogue.len(), 3);
    }

    #[test]
    fn test_empty_catalogue() {
        let catalogue = DeviceCatalogue::default();
        assert!(catalogue.is_empty());
        assert!(catalogue
            .devices(MediaKind::Video, FacingPosition::Back)
            .is_empty());
    }
}
