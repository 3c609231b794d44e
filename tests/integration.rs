//! Integration tests for deej-hid host-testable logic.
//!
//! Slider samples go in through the mixer; what comes out is checked at the
//! stack boundary (GATT port / HID endpoint).

use std::cell::RefCell;

use deej_hid::config::{DEVICE_NAME, MANUFACTURER_NAME, VOLUME_REPORT_ID};
use deej_hid::hid::VOLUME_REPORT_DESCRIPTOR;
use deej_hid::transport::ble::{
    BleState, BleTransport, ConnectionObserver, GattPort, LinkState, SecurityPolicy,
    SubscriptionObserver,
};
use deej_hid::transport::usb::{HidEndpoint, UsbTransport};
use deej_hid::{BleError, DeviceIdentity, Error, Mixer, Pacer, UsbError};
use embassy_futures::block_on;

// ═══════════════════════════════════════════════════════════════════════════
// Fakes
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct FakeGatt {
    notifications: RefCell<bool>,
    value: RefCell<Vec<u8>>,
    notified: RefCell<Vec<Vec<u8>>>,
    adverts: RefCell<usize>,
    report_map: RefCell<Vec<u8>>,
}

impl GattPort for FakeGatt {
    fn set_security(&self, policy: SecurityPolicy) {
        assert!(policy.bonding && policy.mitm && policy.secure_connections);
    }

    fn publish(&self, _identity: &DeviceIdentity, report_map: &[u8]) -> Result<(), BleError> {
        *self.report_map.borrow_mut() = report_map.to_vec();
        Ok(())
    }

    fn start_advertising(&self) -> Result<(), BleError> {
        *self.adverts.borrow_mut() += 1;
        Ok(())
    }

    fn set_notifications(&self, _report_id: u8, enabled: bool) {
        *self.notifications.borrow_mut() = enabled;
    }

    fn set_report_value(&self, report_id: u8, payload: &[u8]) -> Result<(), BleError> {
        assert_eq!(report_id, VOLUME_REPORT_ID);
        *self.value.borrow_mut() = payload.to_vec();
        Ok(())
    }

    fn notify(&self, _report_id: u8) -> Result<(), BleError> {
        if !*self.notifications.borrow() {
            return Err(BleError::NotifyFailed);
        }
        self.notified.borrow_mut().push(self.value.borrow().clone());
        Ok(())
    }

    fn set_battery_level(&self, _level: u8) -> Result<(), BleError> {
        Ok(())
    }
}

#[derive(Default)]
struct CountingPacer {
    total_ms: u32,
}

impl Pacer for CountingPacer {
    async fn pause(&mut self, ms: u32) {
        self.total_ms += ms;
    }
}

#[derive(Default)]
struct FakeEndpoint {
    ready: bool,
    descriptor: Vec<u8>,
    packets: Vec<Vec<u8>>,
}

impl HidEndpoint for FakeEndpoint {
    fn activate(&mut self, report_descriptor: &[u8]) -> Result<(), UsbError> {
        self.descriptor = report_descriptor.to_vec();
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    async fn write(&mut self, report: &[u8]) -> Result<(), UsbError> {
        self.packets.push(report.to_vec());
        Ok(())
    }
}

fn identity() -> DeviceIdentity {
    DeviceIdentity::new(DEVICE_NAME, MANUFACTURER_NAME).unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════
// BLE
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn ble_mixer_session() {
    let link = LinkState::new();
    let gatt = FakeGatt::default();
    let transport = BleTransport::new(&link, &gatt, CountingPacer::default(), identity());
    let events = transport.events();
    let mut mixer = Mixer::new(transport, 10).unwrap();

    mixer.begin().unwrap();
    assert_eq!(mixer.transport().state(), BleState::Advertising);
    assert_eq!(*gatt.report_map.borrow(), VOLUME_REPORT_DESCRIPTOR);
    assert_eq!(*gatt.adverts.borrow(), 1);

    // No host yet: nothing reaches the stack.
    block_on(mixer.set_all(&[1023, 1023, 1023, 1023, 1023])).unwrap();
    assert!(gatt.value.borrow().is_empty());

    // Connected but still pairing: the host has not subscribed yet.
    events.on_connect();
    assert!(mixer.transport().is_connected());
    block_on(mixer.set_all(&[0, 0, 0, 0, 0])).unwrap();
    assert!(gatt.notified.borrow().is_empty());
    assert_eq!(*gatt.value.borrow(), vec![0, 0, 0, 0, 0]);

    events.on_subscription(true);
    block_on(mixer.set_all(&[1023, 512, 0, 255, 128])).unwrap();
    block_on(mixer.set_channel(4, 1023)).unwrap();
    assert_eq!(
        *gatt.notified.borrow(),
        [vec![255, 128, 0, 63, 32], vec![255, 128, 0, 63, 255]]
    );

    // Host drops: advertising restarts, later sends are silent.
    events.on_disconnect();
    assert_eq!(mixer.transport().state(), BleState::Advertising);
    assert_eq!(*gatt.adverts.borrow(), 2);
    block_on(mixer.set_all(&[0, 0, 0, 0, 0])).unwrap();
    assert_eq!(gatt.notified.borrow().len(), 2);

    // Reconnect (bonded host, subscription restored) picks up from the
    // current report.
    events.on_connect();
    events.on_subscription(true);
    block_on(mixer.set_channel(0, 4)).unwrap();
    assert_eq!(gatt.notified.borrow().last().unwrap(), &vec![1, 0, 0, 0, 0]);

    mixer.end();
    assert_eq!(mixer.transport().state(), BleState::Ended);
    block_on(mixer.set_channel(0, 1023)).unwrap();
    assert_eq!(gatt.notified.borrow().len(), 3);
}

#[test]
fn ble_identity_frozen_after_begin() {
    let link = LinkState::new();
    let gatt = FakeGatt::default();
    let mut transport = BleTransport::new(&link, &gatt, CountingPacer::default(), identity());
    transport.set_name("Desk Mixer").unwrap();
    transport.set_vendor_id(0x1209).unwrap();

    let mut mixer = Mixer::new(transport, 12).unwrap();
    mixer.begin().unwrap();

    let transport = mixer.transport_mut();
    assert_eq!(transport.identity().name(), "Desk Mixer");
    assert_eq!(transport.identity().vendor_id(), 0x1209);
    assert_eq!(transport.set_name("Other"), Err(Error::IdentityLocked));
    assert_eq!(transport.identity().name(), "Desk Mixer");
}

// ═══════════════════════════════════════════════════════════════════════════
// USB
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn usb_mixer_session() {
    let mut mixer = Mixer::new(UsbTransport::new(FakeEndpoint::default()), 10).unwrap();
    mixer.begin().unwrap();
    assert_eq!(
        mixer.transport().endpoint().descriptor,
        VOLUME_REPORT_DESCRIPTOR
    );

    // Not enumerated yet: dropped.
    block_on(mixer.set_all(&[1023, 512, 0, 255, 128])).unwrap();
    assert!(mixer.transport().endpoint().packets.is_empty());

    mixer.transport_mut().endpoint_mut().ready = true;
    block_on(mixer.set_channel(1, 0)).unwrap();
    assert_eq!(
        mixer.transport().endpoint().packets,
        [vec![VOLUME_REPORT_ID, 255, 0, 0, 63, 32]]
    );

    assert_eq!(mixer.begin(), Err(Error::AlreadyStarted));
}

#[test]
fn rejected_samples_leave_report_unchanged() {
    let mut mixer = Mixer::new(
        UsbTransport::new(FakeEndpoint {
            ready: true,
            ..Default::default()
        }),
        10,
    )
    .unwrap();
    mixer.begin().unwrap();

    block_on(mixer.set_all(&[4, 8, 12, 16, 20])).unwrap();
    assert!(block_on(mixer.set_all(&[1023; 4])).is_err());
    assert!(block_on(mixer.set_channel(5, 1023)).is_err());

    assert_eq!(mixer.report().payload(), &[1, 2, 3, 4, 5]);
    assert_eq!(mixer.transport().endpoint().packets.len(), 1);
}
