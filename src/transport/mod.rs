//! Report delivery to the host.
//!
//! Two transports share one interface and are picked at build time:
//!
//! - [`ble::BleTransport`] - HID-over-GATT peripheral. Connection state is
//!   written by the BLE stack's task and read by the sampling loop.
//! - [`usb::UsbTransport`] - USB HID interrupt-IN endpoint, gated on
//!   endpoint readiness.
//!
//! Both talk to their stack through a small port trait ([`ble::GattPort`],
//! [`usb::HidEndpoint`]) so the delivery rules run on the host in tests.

pub mod ble;
pub mod usb;

use crate::error::Error;
use crate::hid::VolumeReport;

/// Common interface of the BLE and USB report transports.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Publish the HID surface and start serving. Call exactly once.
    fn begin(&mut self) -> Result<(), Error>;

    /// Deliver the latest report if the link can take it, otherwise drop it.
    ///
    /// Never fails: an unavailable link is silent and stack errors are only
    /// logged, so the next call simply tries again.
    async fn send_report(&mut self, report: &VolumeReport);

    /// Update the published battery percentage (0..=100).
    fn set_battery_level(&mut self, level: u8) -> Result<(), Error>;

    /// Stop serving. Later sends are no-ops and the transport cannot be
    /// started again; the underlying radio / USB stack is left running.
    fn end(&mut self);
}

/// Spacing between consecutive notifications.
#[allow(async_fn_in_trait)]
pub trait Pacer {
    /// Wait at least `ms` milliseconds.
    async fn pause(&mut self, ms: u32);
}

/// Lifecycle of a transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum Phase {
    Idle,
    Serving,
    Ended,
}
