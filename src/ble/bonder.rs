//! Pairing and bonding for the peripheral role.
//!
//! Bonds live in RAM for the lifetime of the device; a power cycle means
//! the host pairs again. Each bond keeps the peer's GATT system attributes
//! (CCCD values) so a bonded host that reconnects is still subscribed.
//! State sits behind critical-section mutexes so the handler can be shared
//! with the GATT port.

use core::cell::{Cell, RefCell};

use deej_hid::config::BLE_MAX_BONDS;
use deej_hid::transport::ble::{LinkSecurity, SecurityPolicy, REQUIRED_SECURITY};
use defmt::{info, warn};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Vec;
use nrf_softdevice::ble::security::{IoCapabilities, SecurityHandler};
use nrf_softdevice::ble::{
    gatt_server, Connection, EncryptionInfo, IdentityKey, MasterId, SecurityMode,
};

/// Room for the CCCDs of the HID and battery services.
const SYS_ATTRS_LEN: usize = 62;

type SysAttrs = Vec<u8, SYS_ATTRS_LEN>;

struct PeerBond {
    master_id: MasterId,
    key: EncryptionInfo,
    peer_id: IdentityKey,
    sys_attrs: SysAttrs,
    /// Last volume-report subscription the host wrote.
    subscribed: bool,
}

pub struct Bonder {
    policy: Mutex<CriticalSectionRawMutex, Cell<SecurityPolicy>>,
    peers: Mutex<CriticalSectionRawMutex, RefCell<Vec<PeerBond, BLE_MAX_BONDS>>>,
}

impl Bonder {
    pub fn new() -> Self {
        Self {
            policy: Mutex::new(Cell::new(REQUIRED_SECURITY)),
            peers: Mutex::new(RefCell::new(Vec::new())),
        }
    }

    pub fn apply(&self, policy: SecurityPolicy) {
        info!("BLE security policy: {}", policy);
        self.policy.lock(|p| p.set(policy));
    }

    fn policy(&self) -> SecurityPolicy {
        self.policy.lock(Cell::get)
    }

    /// Run `f` on the bond of the host behind `conn`, if there is one.
    fn with_peer<R>(&self, conn: &Connection, f: impl FnOnce(&mut PeerBond) -> R) -> Option<R> {
        let addr = conn.peer_address();
        self.peers.lock(|peers| {
            peers
                .borrow_mut()
                .iter_mut()
                .find(|p| p.peer_id.is_match(addr))
                .map(f)
        })
    }

    /// Remember the host's volume-report subscription for its next visit.
    pub fn remember_subscription(&self, conn: &Connection, subscribed: bool) {
        self.with_peer(conn, |p| p.subscribed = subscribed);
    }

    /// Subscription a bonded host had when it last left; false for
    /// unknown hosts.
    pub fn restored_subscription(&self, conn: &Connection) -> bool {
        self.with_peer(conn, |p| p.subscribed).unwrap_or(false)
    }
}

impl SecurityHandler for Bonder {
    fn io_capabilities(&self) -> IoCapabilities {
        // MITM protection needs an authenticated method; we can show a passkey.
        if self.policy().mitm {
            IoCapabilities::DisplayOnly
        } else {
            IoCapabilities::None
        }
    }

    fn can_bond(&self, _conn: &Connection) -> bool {
        self.policy().bonding
    }

    fn display_passkey(&self, passkey: &[u8; 6]) {
        info!("BLE pairing passkey: {=[u8]:a}", passkey);
    }

    fn on_bonded(
        &self,
        _conn: &Connection,
        master_id: MasterId,
        key: EncryptionInfo,
        peer_id: IdentityKey,
    ) {
        self.peers.lock(|peers| {
            let mut peers = peers.borrow_mut();
            if let Some(existing) = peers.iter_mut().find(|p| p.master_id == master_id) {
                existing.key = key;
                existing.peer_id = peer_id;
                return;
            }

            if peers.is_full() {
                peers.remove(0);
            }

            let _ = peers.push(PeerBond {
                master_id,
                key,
                peer_id,
                sys_attrs: Vec::new(),
                subscribed: false,
            });
            info!("BLE host bonded ({} stored)", peers.len());
        });
    }

    fn get_key(&self, _conn: &Connection, master_id: MasterId) -> Option<EncryptionInfo> {
        self.peers.lock(|peers| {
            peers
                .borrow()
                .iter()
                .find_map(|p| (p.master_id == master_id).then_some(p.key))
        })
    }

    fn save_sys_attrs(&self, conn: &Connection) {
        let mut buf = [0u8; SYS_ATTRS_LEN];
        let attrs = match gatt_server::get_sys_attrs(conn, &mut buf) {
            Ok(len) => &buf[..len],
            Err(e) => {
                warn!("BLE sys attrs not saved: {:?}", e);
                return;
            }
        };
        let saved = self.with_peer(conn, |p| {
            p.sys_attrs.clear();
            p.sys_attrs.extend_from_slice(attrs).is_ok()
        });
        if saved == Some(false) {
            warn!("BLE sys attrs too large ({} bytes)", attrs.len());
        }
    }

    fn load_sys_attrs(&self, conn: &Connection) {
        let attrs: SysAttrs = self.with_peer(conn, |p| p.sys_attrs.clone()).unwrap_or_default();
        let attrs = (!attrs.is_empty()).then_some(attrs.as_slice());
        if let Err(e) = gatt_server::set_sys_attrs(conn, attrs) {
            warn!("BLE sys attrs not restored: {:?}", e);
        }
    }

    fn on_security_update(&self, _conn: &Connection, mode: SecurityMode) {
        info!("BLE security mode updated: {}", mode);
        if let Err(e) = self.policy().check(link_security(mode)) {
            warn!("BLE pairing failed: {} (mode {})", e, mode);
        }
    }
}

fn link_security(mode: SecurityMode) -> LinkSecurity {
    match mode {
        SecurityMode::NoAccess | SecurityMode::Open => LinkSecurity::Open,
        SecurityMode::JustWorks | SecurityMode::Signed => LinkSecurity::Encrypted,
        SecurityMode::Mitm | SecurityMode::SignedMitm => LinkSecurity::Authenticated,
        SecurityMode::LescMitm => LinkSecurity::AuthenticatedSecure,
    }
}
