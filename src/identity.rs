//! Device identity published by the transports.

use heapless::String;

use crate::config::{
    BLE_PRODUCT_ID, BLE_VENDOR_ID, BLE_VERSION, DEFAULT_BATTERY_LEVEL, MAX_IDENTITY_LEN,
    PNP_VENDOR_ID_SOURCE,
};
use crate::error::Error;

/// Name, manufacturer, PnP IDs and battery level of the mixer.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceIdentity {
    name: String<MAX_IDENTITY_LEN>,
    manufacturer: String<MAX_IDENTITY_LEN>,
    vendor_id: u16,
    product_id: u16,
    version: u16,
    battery_level: u8,
}

impl DeviceIdentity {
    /// Identity with the default PnP IDs and a full battery.
    pub fn new(name: &str, manufacturer: &str) -> Result<Self, Error> {
        Ok(Self {
            name: bounded(name)?,
            manufacturer: bounded(manufacturer)?,
            vendor_id: BLE_VENDOR_ID,
            product_id: BLE_PRODUCT_ID,
            version: BLE_VERSION,
            battery_level: DEFAULT_BATTERY_LEVEL,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn battery_level(&self) -> u8 {
        self.battery_level
    }

    pub fn set_name(&mut self, name: &str) -> Result<(), Error> {
        self.name = bounded(name)?;
        Ok(())
    }

    pub fn set_manufacturer(&mut self, manufacturer: &str) -> Result<(), Error> {
        self.manufacturer = bounded(manufacturer)?;
        Ok(())
    }

    pub fn set_vendor_id(&mut self, vendor_id: u16) {
        self.vendor_id = vendor_id;
    }

    pub fn set_product_id(&mut self, product_id: u16) {
        self.product_id = product_id;
    }

    pub fn set_version(&mut self, version: u16) {
        self.version = version;
    }

    /// Battery percentage, 0..=100.
    pub fn set_battery_level(&mut self, level: u8) -> Result<(), Error> {
        if level > 100 {
            return Err(Error::BatteryOutOfRange(level));
        }
        self.battery_level = level;
        Ok(())
    }

    /// PnP ID characteristic value (0x2A50): source, VID, PID, version,
    /// all little-endian.
    pub fn pnp_id(&self) -> [u8; 7] {
        let vid = self.vendor_id.to_le_bytes();
        let pid = self.product_id.to_le_bytes();
        let ver = self.version.to_le_bytes();
        [
            PNP_VENDOR_ID_SOURCE,
            vid[0],
            vid[1],
            pid[0],
            pid[1],
            ver[0],
            ver[1],
        ]
    }
}

fn bounded(s: &str) -> Result<String<MAX_IDENTITY_LEN>, Error> {
    let mut out = String::new();
    out.push_str(s)
        .map_err(|_| Error::NameTooLong { len: s.len() })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let id = DeviceIdentity::new("Deej Mixer", "deej-hid").unwrap();
        assert_eq!(id.name(), "Deej Mixer");
        assert_eq!(id.manufacturer(), "deej-hid");
        assert_eq!(id.vendor_id(), 0x05ac);
        assert_eq!(id.product_id(), 0x820a);
        assert_eq!(id.version(), 0x0210);
        assert_eq!(id.battery_level(), 100);
    }

    #[test]
    fn names_up_to_15_bytes_accepted() {
        let id = DeviceIdentity::new("ABCDEFGHIJKLMNO", "123456789012345").unwrap();
        assert_eq!(id.name().len(), 15);
        assert_eq!(id.manufacturer().len(), 15);
    }

    #[test]
    fn oversized_names_rejected() {
        assert_eq!(
            DeviceIdentity::new("ABCDEFGHIJKLMNOP", "x").unwrap_err(),
            Error::NameTooLong { len: 16 }
        );
        assert!(DeviceIdentity::new("x", "a much too long manufacturer").is_err());

        let mut id = DeviceIdentity::new("short", "short").unwrap();
        assert!(id.set_name("this name is far too long").is_err());
        assert_eq!(id.name(), "short");
    }

    #[test]
    fn pnp_id_is_little_endian() {
        let mut id = DeviceIdentity::new("a", "b").unwrap();
        assert_eq!(id.pnp_id(), [0x02, 0xac, 0x05, 0x0a, 0x82, 0x10, 0x02]);

        id.set_vendor_id(0x1234);
        id.set_product_id(0xABCD);
        id.set_version(0x0001);
        assert_eq!(id.pnp_id(), [0x02, 0x34, 0x12, 0xCD, 0xAB, 0x01, 0x00]);
    }

    #[test]
    fn battery_level_bounds() {
        let mut id = DeviceIdentity::new("a", "b").unwrap();
        id.set_battery_level(0).unwrap();
        id.set_battery_level(100).unwrap();
        assert_eq!(id.battery_level(), 100);
        assert_eq!(
            id.set_battery_level(101).unwrap_err(),
            Error::BatteryOutOfRange(101)
        );
        assert_eq!(id.battery_level(), 100);
    }
}
