//! Bluetooth Low Energy subsystem.
//!
//! This module drives the Nordic SoftDevice S140 in **Peripheral** role:
//!
//! 1. **Server** - HID, Device Information and Battery GATT services.
//! 2. **Bonder** - passkey-display pairing with bonds (keys and CCCD
//!    state) kept in RAM.
//! 3. **Peripheral task** - advertises when asked, runs the GATT server
//!    for the lifetime of each link and reports connect / disconnect to
//!    the transport.
//!
//! The transport itself ([`deej_hid::transport::ble::BleTransport`]) only
//! sees the stack through [`server::SoftdeviceGatt`].

mod bonder;
mod server;

use deej_hid::config::{BLE_ADV_INTERVAL, MAX_IDENTITY_LEN};
use deej_hid::transport::ble::{
    BleEvents, BleTransport, ConnectionObserver, LinkState, SubscriptionObserver, WriteObserver,
    WriteTarget,
};
use deej_hid::{DeviceIdentity, Pacer};
use defmt::{info, unwrap, warn};
use embassy_executor::Spawner;
use embassy_time::Timer;
use nrf_softdevice::ble::{gatt_server, peripheral};
use nrf_softdevice::{raw, Softdevice};
use static_cell::StaticCell;

use bonder::Bonder;
use server::{
    BatteryServiceEvent, HidServiceEvent, Server, ServerEvent, SoftdeviceGatt, ADVERTISE,
};

/// The transport handed to the mixer.
pub type Ble = BleTransport<'static, SoftdeviceGatt, TimerPacer>;

static LINK: LinkState = LinkState::new();
static SERVER: StaticCell<Server> = StaticCell::new();
static BONDER: StaticCell<Bonder> = StaticCell::new();
static GATT: StaticCell<SoftdeviceGatt> = StaticCell::new();

/// Paces notifications with the Embassy timer instead of spinning.
pub struct TimerPacer;

impl Pacer for TimerPacer {
    async fn pause(&mut self, ms: u32) {
        Timer::after_millis(u64::from(ms)).await;
    }
}

/// Enable the SoftDevice, register the GATT server and spawn the BLE tasks.
///
/// Must be called exactly once.
pub fn init(spawner: Spawner, identity: DeviceIdentity) -> Ble {
    let config = softdevice_config(&identity);
    let sd = Softdevice::enable(&config);
    let server = SERVER.init(unwrap!(Server::new(sd)));
    let sd: &'static Softdevice = sd;
    unwrap!(spawner.spawn(softdevice_task(sd)));

    let bonder = BONDER.init(Bonder::new());
    let gatt = GATT.init(SoftdeviceGatt::new(server, bonder));
    let ble = BleTransport::new(&LINK, gatt, TimerPacer, identity);
    unwrap!(spawner.spawn(peripheral_task(sd, gatt, bonder, ble.events())));

    info!("BLE stack ready");
    ble
}

fn softdevice_config(identity: &DeviceIdentity) -> nrf_softdevice::Config {
    let name = identity.name();
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 256 }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: name.as_ptr() as _,
            current_len: name.len() as u16,
            max_len: MAX_IDENTITY_LEN as u16,
            write_perm: unsafe { core::mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    }
}

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

/// Advertise on request, then serve one host at a time.
#[embassy_executor::task]
async fn peripheral_task(
    sd: &'static Softdevice,
    gatt: &'static SoftdeviceGatt,
    bonder: &'static Bonder,
    events: BleEvents<'static, SoftdeviceGatt>,
) -> ! {
    let server = gatt.server();

    loop {
        ADVERTISE.wait().await;

        let Some(adv_data) = gatt.advertisement() else {
            warn!("advertising requested before the GATT server was published");
            continue;
        };
        let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
            adv_data: &adv_data,
            scan_data: &[],
        };
        let config = peripheral::Config {
            interval: BLE_ADV_INTERVAL,
            ..Default::default()
        };

        info!("BLE advertising");
        let conn = match peripheral::advertise_pairable(sd, adv, &config, bonder).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("BLE advertising failed: {:?}", e);
                continue;
            }
        };

        gatt.attach(&conn);
        events.on_connect();
        // A bonded host does not rewrite its CCCD; carry its last choice over.
        if bonder.restored_subscription(&conn) {
            events.on_subscription(true);
        }

        let reason = gatt_server::run(&conn, server, |e| match e {
            ServerEvent::Hid(e) => match e {
                HidServiceEvent::ControlPointWrite(v) => {
                    events.on_write(WriteTarget::ControlPoint, &[v])
                }
                HidServiceEvent::ProtocolModeWrite(v) => {
                    events.on_write(WriteTarget::ProtocolMode, &[v])
                }
                HidServiceEvent::VolumeReportCccdWrite { notifications } => {
                    bonder.remember_subscription(&conn, notifications);
                    events.on_subscription(notifications);
                }
            },
            ServerEvent::Bas(BatteryServiceEvent::BatteryLevelCccdWrite { notifications }) => {
                info!("host battery notifications: {}", notifications)
            }
            #[allow(unreachable_patterns)]
            _ => {}
        })
        .await;

        info!("BLE link closed: {:?}", reason);
        gatt.detach();
        events.on_disconnect();
    }
}
