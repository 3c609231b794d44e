//! USB Device subsystem - presents the slider mixer as a HID device.
//!
//! The nRF52840's built-in USB 2.0 Full-Speed controller is driven by
//! `embassy-usb` with a single HID interface whose interrupt-IN endpoint
//! carries the volume report (report ID first).

pub mod hid_device;

pub use hid_device::init;
