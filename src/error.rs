//! Unified error type for deej-hid.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (behind the `defmt` feature) for efficient
//! on-target logging.

use thiserror::Error;

/// Top-level error type used across the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // Report assembly
    /// Channel index outside the volume report.
    #[error("channel {index} out of range (report has {len} channels)")]
    ChannelOutOfRange { index: usize, len: usize },

    /// Bulk update with the wrong number of samples.
    #[error("expected {expected} samples, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// ADC bit depth the truncator cannot represent.
    #[error("invalid ADC bit width {0}")]
    InvalidBitWidth(u8),

    // Identity
    /// Device or manufacturer name longer than `MAX_IDENTITY_LEN`.
    #[error("name is {len} bytes, limit is {}", crate::config::MAX_IDENTITY_LEN)]
    NameTooLong { len: usize },

    /// Battery level above 100 %.
    #[error("battery level {0} out of range")]
    BatteryOutOfRange(u8),

    /// Identity changes are refused once the transport has started.
    #[error("identity is locked after begin")]
    IdentityLocked,

    // Lifecycle
    /// `begin()` called on a transport that already started (or ended).
    #[error("transport already started")]
    AlreadyStarted,

    /// Report descriptor does not fit the descriptor buffer.
    #[error("descriptor needs {needed} bytes, {available} available")]
    DescriptorOverflow { needed: usize, available: usize },

    // Stacks
    /// The BLE stack reported an error.
    #[error("BLE: {0}")]
    Ble(BleError),

    /// The USB stack reported an error.
    #[error("USB: {0}")]
    Usb(UsbError),
}

/// Subset of BLE errors we propagate (keeps the enum `Copy`-friendly).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BleError {
    /// GAP / GATT raw error code from the SoftDevice.
    #[error("raw error {0:#x}")]
    Raw(u32),
    /// Advertising could not start.
    #[error("advertising failed")]
    AdvertisingFailed,
    /// A characteristic value could not be written.
    #[error("set value failed")]
    SetValueFailed,
    /// Notification to the peer failed.
    #[error("notify failed")]
    NotifyFailed,
    /// Pairing or bonding with the host failed.
    #[error("pairing failed")]
    PairingFailed,
}

/// USB HID endpoint errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsbError {
    /// Endpoint disabled (host not configured, or cable pulled).
    #[error("endpoint disabled")]
    Disabled,
    /// Report larger than the endpoint packet size.
    #[error("buffer overflow")]
    BufferOverflow,
    /// Registered descriptor differs from the one the HID class serves.
    #[error("report descriptor mismatch")]
    DescriptorMismatch,
}

// Convenience conversions

impl From<BleError> for Error {
    fn from(e: BleError) -> Self {
        Error::Ble(e)
    }
}

impl From<UsbError> for Error {
    fn from(e: UsbError) -> Self {
        Error::Usb(e)
    }
}
