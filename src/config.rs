//! Application-wide constants and compile-time configuration.
//!
//! Report layout, identity defaults, timing parameters and USB
//! descriptors live here so they can be tuned in one place.

// Report layout

/// Number of sliders, and bytes in one volume-array report.
pub const CHANNEL_COUNT: usize = 5;

/// HID report ID of the volume array. The deej host reads report 1.
pub const VOLUME_REPORT_ID: u8 = 0x01;

// Sliders

/// ADC resolution of the slider samples (bits).
pub const SLIDER_ADC_BITS: u8 = 10;

/// Resolutions the nRF52840 SAADC can sample at.
pub const fn is_saadc_resolution(bits: u8) -> bool {
    matches!(bits, 8 | 10 | 12 | 14)
}

const _: () = assert!(
    is_saadc_resolution(SLIDER_ADC_BITS),
    "SLIDER_ADC_BITS must be 8, 10, 12 or 14"
);

/// Sampling loop period (ms).
pub const SLIDER_SAMPLE_PERIOD_MS: u64 = 10;

// Identity

/// Longest device or manufacturer name accepted (bytes).
pub const MAX_IDENTITY_LEN: usize = 15;

pub const DEVICE_NAME: &str = "Deej Mixer";
pub const MANUFACTURER_NAME: &str = "deej-hid";

/// Battery level published until told otherwise (%).
pub const DEFAULT_BATTERY_LEVEL: u8 = 100;

// BLE

/// PnP ID defaults. Hosts pair with these without a custom driver.
pub const BLE_VENDOR_ID: u16 = 0x05ac;
pub const BLE_PRODUCT_ID: u16 = 0x820a;
pub const BLE_VERSION: u16 = 0x0210;

/// PnP vendor ID source: 0x02 = USB Implementer's Forum.
pub const PNP_VENDOR_ID_SOURCE: u8 = 0x02;

/// GAP appearance "Generic HID".
pub const BLE_APPEARANCE_GENERIC_HID: u16 = 0x03C0;

/// Advertising interval (in 0.625 ms units). 50 = 31.25 ms.
pub const BLE_ADV_INTERVAL: u32 = 50;

/// Minimum spacing between two volume notifications (ms).
pub const BLE_NOTIFY_DELAY_MS: u32 = 7;

/// Maximum number of bonded hosts kept in RAM.
pub const BLE_MAX_BONDS: usize = 4;

// USB

/// USB VID/PID - the pair the deej host application enumerates.
pub const USB_VID: u16 = 0x2341;
pub const USB_PID: u16 = 0x0DEE;

/// USB device strings.
pub const USB_MANUFACTURER: &str = MANUFACTURER_NAME;
pub const USB_PRODUCT: &str = DEVICE_NAME;
pub const USB_SERIAL_NUMBER: &str = "000001";

/// USB HID polling interval (ms).
pub const USB_HID_POLL_MS: u8 = 1;

/// Bytes reserved for the concatenated HID report descriptor set.
pub const USB_REPORT_DESCRIPTOR_CAPACITY: usize = 64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saadc_resolutions() {
        for bits in [8, 10, 12, 14] {
            assert!(is_saadc_resolution(bits), "{bits} bits");
        }
        for bits in [0, 9, 11, 13, 16] {
            assert!(!is_saadc_resolution(bits), "{bits} bits");
        }
    }

    #[test]
    fn slider_width_is_sampleable() {
        assert!(is_saadc_resolution(SLIDER_ADC_BITS));
    }
}
