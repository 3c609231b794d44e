//! Hardware-independent core of the deej-hid firmware.
//!
//! Slider samples are truncated into a fixed 5-byte HID volume array and
//! pushed to the host over one of two transports chosen at build time:
//! BLE HID-over-GATT or wired USB HID.
//!
//! Everything here runs on the host (`cargo test --lib`); the stacks are
//! reached through the port traits in [`transport`], which the firmware
//! in `main.rs` implements on top of nrf-softdevice and embassy-usb.
//!
//! Note: The embedded binary uses main.rs with #![no_std] and #![no_main].

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod config;
pub mod error;
pub mod hid;
pub mod identity;
pub mod mixer;
pub mod sample;
pub mod transport;

pub use error::{BleError, Error, UsbError};
pub use hid::VolumeReport;
pub use identity::DeviceIdentity;
pub use mixer::Mixer;
pub use transport::{Pacer, Transport};

// ═══════════════════════════════════════════════════════════════════════════
// Cross-module Tests
// ═══════════════════════════════════════════════════════════════════════════
