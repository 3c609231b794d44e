//! USB HID transport.
//!
//! There is no connection handshake at this layer: the interrupt-IN
//! endpoint is either ready (host configured the device, bus awake) or it
//! is not. A report offered while the endpoint is not ready is dropped.

use crate::config::{USB_REPORT_DESCRIPTOR_CAPACITY, VOLUME_REPORT_ID};
use crate::error::{Error, UsbError};
use crate::hid::{ReportDescriptorSet, VolumeReport, VOLUME_REPORT_DESCRIPTOR, VOLUME_REPORT_SIZE};
use crate::transport::{Phase, Transport};

/// The USB HID interface as seen by the transport.
#[allow(async_fn_in_trait)]
pub trait HidEndpoint {
    /// Bring the HID interface up with the given report descriptor set.
    fn activate(&mut self, report_descriptor: &[u8]) -> Result<(), UsbError>;

    /// Whether a write would be accepted right now.
    fn is_ready(&self) -> bool;

    /// Write one report (report ID first).
    async fn write(&mut self, report: &[u8]) -> Result<(), UsbError>;
}

/// USB volume-array transport.
pub struct UsbTransport<E: HidEndpoint> {
    endpoint: E,
    descriptors: ReportDescriptorSet<USB_REPORT_DESCRIPTOR_CAPACITY>,
    descriptor_offset: Option<usize>,
    battery_level: u8,
    phase: Phase,
}

impl<E: HidEndpoint> UsbTransport<E> {
    pub fn new(endpoint: E) -> Self {
        Self {
            endpoint,
            descriptors: ReportDescriptorSet::new(),
            descriptor_offset: None,
            battery_level: crate::config::DEFAULT_BATTERY_LEVEL,
            phase: Phase::Idle,
        }
    }

    /// Where the volume descriptor sits in the descriptor set.
    pub fn descriptor_offset(&self) -> Option<usize> {
        self.descriptor_offset
    }

    /// The descriptor set handed to the endpoint.
    pub fn report_descriptors(&self) -> &[u8] {
        self.descriptors.as_bytes()
    }

    pub fn battery_level(&self) -> u8 {
        self.battery_level
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    pub fn endpoint_mut(&mut self) -> &mut E {
        &mut self.endpoint
    }
}

impl<E: HidEndpoint> Transport for UsbTransport<E> {
    fn begin(&mut self) -> Result<(), Error> {
        if self.phase != Phase::Idle {
            return Err(Error::AlreadyStarted);
        }

        // Register once, even if a previous activation attempt failed.
        if self.descriptor_offset.is_none() {
            let offset = self.descriptors.register(VOLUME_REPORT_DESCRIPTOR)?;
            self.descriptor_offset = Some(offset);
            debug!(
                "USB report descriptor at offset {}, set is {} bytes",
                offset,
                self.descriptors.as_bytes().len()
            );
        }

        self.endpoint.activate(self.descriptors.as_bytes())?;
        self.phase = Phase::Serving;
        info!("USB HID interface active (report id {})", VOLUME_REPORT_ID);
        Ok(())
    }

    async fn send_report(&mut self, report: &VolumeReport) {
        if self.phase != Phase::Serving {
            return;
        }
        if !self.endpoint.is_ready() {
            debug!("USB endpoint not ready - report dropped");
            return;
        }

        let mut buf = [0u8; VOLUME_REPORT_SIZE];
        let n = report.serialize(&mut buf);
        if let Err(_e) = self.endpoint.write(&buf[..n]).await {
            warn!("USB report write failed: {}", _e);
        }
    }

    fn set_battery_level(&mut self, level: u8) -> Result<(), Error> {
        if level > 100 {
            return Err(Error::BatteryOutOfRange(level));
        }
        // No battery surface on the wired link; keep it for inspection.
        self.battery_level = level;
        Ok(())
    }

    fn end(&mut self) {
        self.phase = Phase::Ended;
        info!("USB transport ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use std::vec::Vec;

    #[derive(Default)]
    struct MockEndpoint {
        ready: bool,
        fail_write: Option<UsbError>,
        fail_activate: bool,
        activations: Vec<Vec<u8>>,
        writes: Vec<Vec<u8>>,
    }

    impl HidEndpoint for MockEndpoint {
        fn activate(&mut self, report_descriptor: &[u8]) -> Result<(), UsbError> {
            if self.fail_activate {
                return Err(UsbError::DescriptorMismatch);
            }
            self.activations.push(report_descriptor.to_vec());
            Ok(())
        }

        fn is_ready(&self) -> bool {
            self.ready
        }

        async fn write(&mut self, report: &[u8]) -> Result<(), UsbError> {
            self.writes.push(report.to_vec());
            match self.fail_write {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }
    }

    const REPORT: VolumeReport = VolumeReport::from_channels([255, 128, 0, 63, 32]);

    fn started(ready: bool) -> UsbTransport<MockEndpoint> {
        let mut usb = UsbTransport::new(MockEndpoint {
            ready,
            ..Default::default()
        });
        usb.begin().unwrap();
        usb
    }

    #[test]
    fn begin_registers_descriptor_once() {
        let mut usb = started(true);
        assert_eq!(usb.descriptor_offset(), Some(0));
        assert_eq!(usb.report_descriptors(), VOLUME_REPORT_DESCRIPTOR);
        assert_eq!(usb.endpoint().activations.len(), 1);
        assert_eq!(usb.endpoint().activations[0], VOLUME_REPORT_DESCRIPTOR);

        assert_eq!(usb.begin().unwrap_err(), Error::AlreadyStarted);
        assert_eq!(usb.report_descriptors().len(), VOLUME_REPORT_DESCRIPTOR.len());
        assert_eq!(usb.endpoint().activations.len(), 1);
    }

    #[test]
    fn failed_activation_does_not_register_twice() {
        let mut usb = UsbTransport::new(MockEndpoint {
            fail_activate: true,
            ..Default::default()
        });
        assert_eq!(
            usb.begin().unwrap_err(),
            Error::Usb(UsbError::DescriptorMismatch)
        );

        usb.endpoint_mut().fail_activate = false;
        usb.begin().unwrap();
        assert_eq!(usb.report_descriptors(), VOLUME_REPORT_DESCRIPTOR);
    }

    #[test]
    fn ready_endpoint_gets_full_report() {
        let mut usb = started(true);
        block_on(usb.send_report(&REPORT));
        assert_eq!(
            usb.endpoint().writes,
            [vec![VOLUME_REPORT_ID, 255, 128, 0, 63, 32]]
        );
    }

    #[test]
    fn not_ready_drops_report() {
        let mut usb = started(false);
        block_on(usb.send_report(&REPORT));
        assert!(usb.endpoint().writes.is_empty());

        // Next call after the host configures us sends the then-current report.
        usb.endpoint_mut().ready = true;
        let newer = VolumeReport::from_channels([1, 2, 3, 4, 5]);
        block_on(usb.send_report(&newer));
        assert_eq!(usb.endpoint().writes, [vec![VOLUME_REPORT_ID, 1, 2, 3, 4, 5]]);
    }

    #[test]
    fn write_failure_is_swallowed() {
        let mut usb = started(true);
        usb.endpoint_mut().fail_write = Some(UsbError::Disabled);

        block_on(usb.send_report(&REPORT));
        block_on(usb.send_report(&REPORT));
        assert_eq!(usb.endpoint().writes.len(), 2);
    }

    #[test]
    fn send_before_begin_or_after_end_is_noop() {
        let mut usb = UsbTransport::new(MockEndpoint {
            ready: true,
            ..Default::default()
        });
        block_on(usb.send_report(&REPORT));
        assert!(usb.endpoint().writes.is_empty());

        usb.begin().unwrap();
        usb.end();
        block_on(usb.send_report(&REPORT));
        assert!(usb.endpoint().writes.is_empty());
        assert_eq!(usb.begin().unwrap_err(), Error::AlreadyStarted);
    }

    #[test]
    fn battery_level_validated() {
        let mut usb = started(true);
        usb.set_battery_level(55).unwrap();
        assert_eq!(usb.battery_level(), 55);
        assert_eq!(
            usb.set_battery_level(101).unwrap_err(),
            Error::BatteryOutOfRange(101)
        );
        assert_eq!(usb.battery_level(), 55);
    }
}
