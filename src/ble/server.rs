//! GATT server - HID, Device Information and Battery services - and the
//! `GattPort` the BLE transport drives it through.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use deej_hid::config::{BLE_APPEARANCE_GENERIC_HID, CHANNEL_COUNT, MAX_IDENTITY_LEN, VOLUME_REPORT_ID};
use deej_hid::hid::HID_INFORMATION;
use deej_hid::transport::ble::{GattPort, SecurityPolicy};
use deej_hid::{BleError, DeviceIdentity};
use defmt::debug;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use heapless::Vec;
use nrf_softdevice::ble::advertisement_builder::{
    AdvertisementDataType, Flag, LegacyAdvertisementBuilder, ServiceList, ServiceUuid16,
};
use nrf_softdevice::ble::Connection;
use nrf_softdevice::raw;

use super::bonder::Bonder;

/// Length of the report map characteristic (the volume report descriptor).
const REPORT_MAP_LEN: usize = 39;

/// Legacy advertising payload limit.
const ADV_DATA_LEN: usize = 31;

/// Raised by the transport to (re)start advertising; consumed by the
/// peripheral task.
pub static ADVERTISE: Signal<CriticalSectionRawMutex, ()> = Signal::new();

#[nrf_softdevice::gatt_service(uuid = "180a")]
pub struct DeviceInformationService {
    /// Manufacturer Name String.
    #[characteristic(uuid = "2a29", read)]
    pub manufacturer_name: Vec<u8, MAX_IDENTITY_LEN>,

    /// PnP ID - vendor source, VID, PID, version.
    #[characteristic(uuid = "2a50", read)]
    pub pnp_id: [u8; 7],
}

#[nrf_softdevice::gatt_service(uuid = "180f")]
pub struct BatteryService {
    #[characteristic(uuid = "2a19", read, notify)]
    pub battery_level: u8,
}

#[nrf_softdevice::gatt_service(uuid = "1812")]
pub struct HidService {
    /// HID Information - bcdHID, country code, flags.
    #[characteristic(uuid = "2a4a", security = "mitm", read)]
    pub hid_info: [u8; 4],

    /// Report Map - the volume report descriptor.
    #[characteristic(uuid = "2a4b", security = "mitm", read)]
    pub report_map: [u8; REPORT_MAP_LEN],

    /// HID Control Point - suspend / exit suspend.
    #[characteristic(uuid = "2a4c", security = "mitm", write_without_response)]
    pub control_point: u8,

    /// Protocol Mode - 1 = Report Protocol.
    #[characteristic(uuid = "2a4e", security = "mitm", read, write_without_response, value = "1")]
    pub protocol_mode: u8,

    /// Input Report - the volume array, one byte per slider.
    #[characteristic(uuid = "2a4d", security = "mitm", read, notify)]
    #[descriptor(uuid = "2908", security = "mitm", value = "[VOLUME_REPORT_ID, 0x01]")]
    pub volume_report: [u8; CHANNEL_COUNT],
}

#[nrf_softdevice::gatt_server]
pub struct Server {
    pub dis: DeviceInformationService,
    pub bas: BatteryService,
    pub hid: HidService,
}

/// SoftDevice-backed [`GattPort`].
pub struct SoftdeviceGatt {
    server: &'static Server,
    bonder: &'static Bonder,
    connection: Mutex<CriticalSectionRawMutex, RefCell<Option<Connection>>>,
    notifications: AtomicBool,
    adv_data: Mutex<CriticalSectionRawMutex, RefCell<Option<Vec<u8, ADV_DATA_LEN>>>>,
}

impl SoftdeviceGatt {
    pub fn new(server: &'static Server, bonder: &'static Bonder) -> Self {
        Self {
            server,
            bonder,
            connection: Mutex::new(RefCell::new(None)),
            notifications: AtomicBool::new(false),
            adv_data: Mutex::new(RefCell::new(None)),
        }
    }

    pub fn server(&self) -> &'static Server {
        self.server
    }

    /// Advertising payload built by `publish`.
    pub fn advertisement(&self) -> Option<Vec<u8, ADV_DATA_LEN>> {
        self.adv_data.lock(|data| data.borrow().clone())
    }

    /// Remember the link the GATT server is running on.
    pub fn attach(&self, conn: &Connection) {
        self.connection
            .lock(|c| *c.borrow_mut() = Some(conn.clone()));
    }

    pub fn detach(&self) {
        self.connection.lock(|c| *c.borrow_mut() = None);
    }

    fn current_connection(&self) -> Option<Connection> {
        self.connection.lock(|c| c.borrow().clone())
    }
}

impl GattPort for SoftdeviceGatt {
    fn set_security(&self, policy: SecurityPolicy) {
        self.bonder.apply(policy);
    }

    fn publish(&self, identity: &DeviceIdentity, report_map: &[u8]) -> Result<(), BleError> {
        let name = identity.name();

        // Peers may not rename us (security mode 0, level 0).
        let no_write = raw::ble_gap_conn_sec_mode_t {
            _bitfield_1: raw::ble_gap_conn_sec_mode_t::new_bitfield_1(0, 0),
        };
        check(unsafe { raw::sd_ble_gap_device_name_set(&no_write, name.as_ptr(), name.len() as u16) })?;
        check(unsafe { raw::sd_ble_gap_appearance_set(BLE_APPEARANCE_GENERIC_HID) })?;

        let mut manufacturer: Vec<u8, MAX_IDENTITY_LEN> = Vec::new();
        manufacturer
            .extend_from_slice(identity.manufacturer().as_bytes())
            .map_err(|_| BleError::SetValueFailed)?;
        let map: [u8; REPORT_MAP_LEN] = report_map
            .try_into()
            .map_err(|_| BleError::SetValueFailed)?;

        self.server
            .dis
            .manufacturer_name_set(&manufacturer)
            .map_err(|_| BleError::SetValueFailed)?;
        self.server
            .dis
            .pnp_id_set(&identity.pnp_id())
            .map_err(|_| BleError::SetValueFailed)?;
        self.server
            .hid
            .hid_info_set(&HID_INFORMATION)
            .map_err(|_| BleError::SetValueFailed)?;
        self.server
            .hid
            .report_map_set(&map)
            .map_err(|_| BleError::SetValueFailed)?;

        // Scan response stays empty.
        let payload = LegacyAdvertisementBuilder::new()
            .flags(&[Flag::GeneralDiscovery, Flag::LE_Only])
            .raw(
                AdvertisementDataType::APPEARANCE,
                &BLE_APPEARANCE_GENERIC_HID.to_le_bytes(),
            )
            .services_16(ServiceList::Complete, &[ServiceUuid16::HUMAN_INTERFACE_DEVICE])
            .full_name(name)
            .build();
        let mut adv: Vec<u8, ADV_DATA_LEN> = Vec::new();
        adv.extend_from_slice(&payload)
            .map_err(|_| BleError::AdvertisingFailed)?;
        self.adv_data.lock(|data| *data.borrow_mut() = Some(adv));

        Ok(())
    }

    fn start_advertising(&self) -> Result<(), BleError> {
        if self.advertisement().is_none() {
            return Err(BleError::AdvertisingFailed);
        }
        ADVERTISE.signal(());
        Ok(())
    }

    fn set_notifications(&self, _report_id: u8, enabled: bool) {
        self.notifications.store(enabled, Ordering::Release);
    }

    fn set_report_value(&self, _report_id: u8, payload: &[u8]) -> Result<(), BleError> {
        let value: [u8; CHANNEL_COUNT] = payload
            .try_into()
            .map_err(|_| BleError::SetValueFailed)?;
        self.server
            .hid
            .volume_report_set(&value)
            .map_err(|_| BleError::SetValueFailed)
    }

    fn notify(&self, _report_id: u8) -> Result<(), BleError> {
        if !self.notifications.load(Ordering::Acquire) {
            debug!("volume notifications disabled - notify skipped");
            return Ok(());
        }
        let conn = self.current_connection().ok_or(BleError::NotifyFailed)?;
        let value = self
            .server
            .hid
            .volume_report_get()
            .map_err(|_| BleError::NotifyFailed)?;
        self.server
            .hid
            .volume_report_notify(&conn, &value)
            .map_err(|_| BleError::NotifyFailed)
    }

    fn set_battery_level(&self, level: u8) -> Result<(), BleError> {
        self.server
            .bas
            .battery_level_set(&level)
            .map_err(|_| BleError::SetValueFailed)?;
        if let Some(conn) = self.current_connection() {
            // Host may not have subscribed; the stored value still updates.
            if self.server.bas.battery_level_notify(&conn, &level).is_err() {
                debug!("battery level notify skipped");
            }
        }
        Ok(())
    }
}

fn check(ret: u32) -> Result<(), BleError> {
    if ret == raw::NRF_SUCCESS {
        Ok(())
    } else {
        Err(BleError::Raw(ret))
    }
}
