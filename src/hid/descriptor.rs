//! HID report descriptor for the volume array, and the descriptor set the
//! USB transport concatenates it into.

use crate::error::Error;

/// Volume-array report descriptor (39 bytes).
///
/// One vendor-defined application collection holding input report
/// `VOLUME_REPORT_ID`: `CHANNEL_COUNT` unsigned bytes, usages 1..=5 in
/// slider order. Served verbatim by the BLE Report Map and the USB HID
/// interface.
pub const VOLUME_REPORT_DESCRIPTOR: &[u8] = &[
    0x06, 0x00, 0xFF, // Usage Page (Vendor Defined 0xFF00)
    0x09, 0x01, // Usage (Deej Mixer)
    0xA1, 0x01, // Collection (Application)
    0x85, 0x01, //   Report ID (1)
    0x09, 0x02, //   Usage (Volume Array)
    0xA1, 0x02, //   Collection (Logical)
    0x19, 0x01, //     Usage Minimum (Slider 1)
    0x29, 0x05, //     Usage Maximum (Slider 5)
    0x15, 0x00, //     Logical Minimum (0)
    0x26, 0xFF, 0x00, //     Logical Maximum (255)
    0x35, 0x00, //     Physical Minimum (0)
    0x46, 0xFF, 0x00, //     Physical Maximum (255)
    0x55, 0x00, //     Unit Exponent (0)
    0x65, 0x00, //     Unit (None)
    0x75, 0x08, //     Report Size (8)
    0x95, 0x05, //     Report Count (5)
    0x81, 0x02, //     Input (Data, Variable, Absolute)
    0xC0, //   End Collection
    0xC0, // End Collection
];

/// HID Information characteristic value: bcdHID 1.11, country 0,
/// flags 0x01 (remote wake).
pub const HID_INFORMATION: [u8; 4] = [0x11, 0x01, 0x00, 0x01];

/// Report descriptors concatenated into one fixed buffer.
///
/// Each registration lands at the current end of the set; its offset is
/// fixed for the life of the set.
#[derive(Clone, Debug)]
pub struct ReportDescriptorSet<const N: usize> {
    buf: [u8; N],
    len: usize,
    count: usize,
}

impl<const N: usize> ReportDescriptorSet<N> {
    pub const fn new() -> Self {
        Self {
            buf: [0; N],
            len: 0,
            count: 0,
        }
    }

    /// Append `descriptor`, returning the offset it was placed at.
    pub fn register(&mut self, descriptor: &[u8]) -> Result<usize, Error> {
        let available = N - self.len;
        if descriptor.len() > available {
            return Err(Error::DescriptorOverflow {
                needed: descriptor.len(),
                available,
            });
        }
        let offset = self.len;
        self.buf[offset..offset + descriptor.len()].copy_from_slice(descriptor);
        self.len += descriptor.len();
        self.count += 1;
        Ok(offset)
    }

    /// The concatenated descriptors.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Number of descriptors registered.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl<const N: usize> Default for ReportDescriptorSet<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CHANNEL_COUNT, VOLUME_REPORT_ID};

    /// Value of the first short item with `prefix` (tag + type + size 1).
    fn item_value(desc: &[u8], prefix: u8) -> Option<u8> {
        let mut i = 0;
        while i < desc.len() {
            let size = match desc[i] & 0x03 {
                3 => 4,
                n => n as usize,
            };
            if desc[i] == prefix {
                return desc.get(i + 1).copied();
            }
            i += 1 + size;
        }
        None
    }

    #[test]
    fn descriptor_is_39_bytes() {
        assert_eq!(VOLUME_REPORT_DESCRIPTOR.len(), 39);
    }

    #[test]
    fn descriptor_declares_report_id_and_channel_count() {
        assert_eq!(
            item_value(VOLUME_REPORT_DESCRIPTOR, 0x85),
            Some(VOLUME_REPORT_ID)
        );
        assert_eq!(
            item_value(VOLUME_REPORT_DESCRIPTOR, 0x95),
            Some(CHANNEL_COUNT as u8)
        );
        assert_eq!(item_value(VOLUME_REPORT_DESCRIPTOR, 0x75), Some(8));
        assert_eq!(
            item_value(VOLUME_REPORT_DESCRIPTOR, 0x29),
            Some(CHANNEL_COUNT as u8)
        );
    }

    #[test]
    fn descriptor_collections_are_balanced() {
        let opens = VOLUME_REPORT_DESCRIPTOR
            .windows(2)
            .filter(|w| w[0] == 0xA1)
            .count();
        assert_eq!(opens, 2);
        assert_eq!(&VOLUME_REPORT_DESCRIPTOR[37..], &[0xC0, 0xC0]);
    }

    #[test]
    fn register_concatenates_at_fixed_offsets() {
        let mut set: ReportDescriptorSet<128> = ReportDescriptorSet::new();
        assert!(set.is_empty());

        assert_eq!(set.register(VOLUME_REPORT_DESCRIPTOR).unwrap(), 0);
        assert_eq!(set.register(&[0xAA, 0xBB]).unwrap(), 39);
        assert_eq!(set.count(), 2);
        assert_eq!(set.as_bytes().len(), 41);
        assert_eq!(&set.as_bytes()[..39], VOLUME_REPORT_DESCRIPTOR);
        assert_eq!(&set.as_bytes()[39..], &[0xAA, 0xBB]);
    }

    #[test]
    fn register_rejects_overflow() {
        let mut set: ReportDescriptorSet<40> = ReportDescriptorSet::default();
        set.register(VOLUME_REPORT_DESCRIPTOR).unwrap();

        let err = set.register(&[0x01, 0x02]).unwrap_err();
        assert_eq!(
            err,
            Error::DescriptorOverflow {
                needed: 2,
                available: 1
            }
        );
        assert_eq!(set.count(), 1);
        assert_eq!(set.as_bytes(), VOLUME_REPORT_DESCRIPTOR);
    }
}
