//! BLE HID-over-GATT transport.
//!
//! State machine:
//!
//! ```text
//! Uninitialized --begin()--> Advertising --host connects--> Connected
//!                                 ^                             |
//!                                 +------host disconnects-------+
//! ```
//!
//! The BLE stack runs in its own task and reports link changes through
//! [`ConnectionObserver`] and the host's notification subscription (its
//! CCCD write, or the value restored for a bonded host) through
//! [`SubscriptionObserver`]; the sampling loop calls `send_report`. The two
//! meet only in [`LinkState`], which is atomic.
//!
//! A connected host that has not subscribed yet, e.g. while the passkey is
//! still being entered, gets the report value updated but no notification.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::config::{BLE_NOTIFY_DELAY_MS, VOLUME_REPORT_ID};
use crate::error::{BleError, Error};
use crate::hid::{VolumeReport, VOLUME_REPORT_DESCRIPTOR};
use crate::identity::DeviceIdentity;
use crate::transport::{Pacer, Phase, Transport};

/// Link state as seen by the stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Externally visible state of the BLE transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BleState {
    Uninitialized,
    Advertising,
    Connected,
    /// `end()` was called; no further advertising or reports.
    Ended,
}

/// Pairing requirements handed to the stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SecurityPolicy {
    pub bonding: bool,
    pub mitm: bool,
    pub secure_connections: bool,
}

/// Secure, bonded pairing with MITM protection. Not optional.
pub const REQUIRED_SECURITY: SecurityPolicy = SecurityPolicy {
    bonding: true,
    mitm: true,
    secure_connections: true,
};

/// Security level a link ended up at after pairing / re-encryption.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkSecurity {
    Open,
    /// Encrypted, unauthenticated (Just Works).
    Encrypted,
    /// Encrypted with MITM protection, legacy pairing.
    Authenticated,
    /// Encrypted with MITM protection, LE Secure Connections.
    AuthenticatedSecure,
}

impl SecurityPolicy {
    /// Check a link's security level against this policy.
    pub fn check(&self, level: LinkSecurity) -> Result<(), BleError> {
        let required = if self.mitm && self.secure_connections {
            LinkSecurity::AuthenticatedSecure
        } else if self.mitm {
            LinkSecurity::Authenticated
        } else {
            LinkSecurity::Open
        };
        if level >= required {
            Ok(())
        } else {
            Err(BleError::PairingFailed)
        }
    }
}

/// Host-writable characteristics of the HID service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteTarget {
    /// HID Control Point (suspend / exit suspend).
    ControlPoint,
    /// Protocol Mode (boot / report).
    ProtocolMode,
}

/// State shared between the BLE stack task and the sampling loop.
pub struct LinkState {
    connected: AtomicBool,
    subscribed: AtomicBool,
    serving: AtomicBool,
}

impl LinkState {
    pub const fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            subscribed: AtomicBool::new(false),
            serving: AtomicBool::new(false),
        }
    }

    pub fn connection(&self) -> ConnectionState {
        if self.connected.load(Ordering::Acquire) {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Whether the connected host has enabled notifications on the input
    /// report.
    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::Acquire)
    }

    /// True between `begin()` and `end()`.
    pub fn is_serving(&self) -> bool {
        self.serving.load(Ordering::Acquire)
    }

    fn set_connection(&self, state: ConnectionState) {
        self.connected
            .store(state == ConnectionState::Connected, Ordering::Release);
    }

    fn set_subscribed(&self, subscribed: bool) {
        self.subscribed.store(subscribed, Ordering::Release);
    }

    fn set_serving(&self, serving: bool) {
        self.serving.store(serving, Ordering::Release);
    }
}

impl Default for LinkState {
    fn default() -> Self {
        Self::new()
    }
}

/// The slice of the GATT server and GAP layer this transport drives.
///
/// Methods take `&self`: the port is shared between the transport and the
/// stack-side event handler.
pub trait GattPort {
    /// Apply the pairing policy. Called before anything is published.
    fn set_security(&self, policy: SecurityPolicy);

    /// Publish device name, appearance, manufacturer, PnP ID, HID
    /// information and the report map.
    fn publish(&self, identity: &DeviceIdentity, report_map: &[u8]) -> Result<(), BleError>;

    /// (Re)start connectable advertising.
    fn start_advertising(&self) -> Result<(), BleError>;

    /// Enable or disable notifications on the input report `report_id`.
    fn set_notifications(&self, report_id: u8, enabled: bool);

    /// Write the value of input report `report_id`.
    fn set_report_value(&self, report_id: u8, payload: &[u8]) -> Result<(), BleError>;

    /// Notify the connected host of the current value of `report_id`.
    fn notify(&self, report_id: u8) -> Result<(), BleError>;

    /// Publish the battery percentage.
    fn set_battery_level(&self, level: u8) -> Result<(), BleError>;
}

/// Link lifecycle callbacks, invoked from the BLE stack's context.
pub trait ConnectionObserver {
    fn on_connect(&self);
    fn on_disconnect(&self);
}

/// Host subscription to the input report, invoked from the BLE stack's
/// context.
pub trait SubscriptionObserver {
    fn on_subscription(&self, enabled: bool);
}

/// Host writes to the HID service, invoked from the BLE stack's context.
pub trait WriteObserver {
    fn on_write(&self, target: WriteTarget, data: &[u8]);
}

/// Stack-side handle of a [`BleTransport`]: implements both observer
/// capabilities over the shared link state and GATT port.
pub struct BleEvents<'a, G: GattPort> {
    link: &'a LinkState,
    gatt: &'a G,
}

impl<G: GattPort> Clone for BleEvents<'_, G> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<G: GattPort> Copy for BleEvents<'_, G> {}

impl<G: GattPort> ConnectionObserver for BleEvents<'_, G> {
    fn on_connect(&self) {
        self.link.set_connection(ConnectionState::Connected);
        if self.link.is_serving() {
            self.gatt.set_notifications(VOLUME_REPORT_ID, true);
        }
        info!("BLE host connected");
    }

    fn on_disconnect(&self) {
        self.link.set_connection(ConnectionState::Disconnected);
        self.link.set_subscribed(false);
        self.gatt.set_notifications(VOLUME_REPORT_ID, false);
        info!("BLE host disconnected");

        if self.link.is_serving() {
            if let Err(_e) = self.gatt.start_advertising() {
                warn!("BLE advertising restart failed: {}", _e);
            }
        }
    }
}

impl<G: GattPort> SubscriptionObserver for BleEvents<'_, G> {
    fn on_subscription(&self, enabled: bool) {
        self.link.set_subscribed(enabled);
        info!("BLE host volume notifications: {}", enabled);
    }
}

impl<G: GattPort> WriteObserver for BleEvents<'_, G> {
    fn on_write(&self, _target: WriteTarget, _data: &[u8]) {
        debug!("BLE host wrote {} = {=[u8]:x}", _target, _data);
    }
}

/// BLE volume-array transport.
pub struct BleTransport<'a, G: GattPort, P: Pacer> {
    link: &'a LinkState,
    gatt: &'a G,
    pacer: P,
    identity: DeviceIdentity,
    notify_delay_ms: u32,
    phase: Phase,
}

impl<'a, G: GattPort, P: Pacer> BleTransport<'a, G, P> {
    pub fn new(link: &'a LinkState, gatt: &'a G, pacer: P, identity: DeviceIdentity) -> Self {
        Self {
            link,
            gatt,
            pacer,
            identity,
            notify_delay_ms: BLE_NOTIFY_DELAY_MS,
            phase: Phase::Idle,
        }
    }

    /// Observer handle for the BLE stack task.
    pub fn events(&self) -> BleEvents<'a, G> {
        BleEvents {
            link: self.link,
            gatt: self.gatt,
        }
    }

    pub fn state(&self) -> BleState {
        match self.phase {
            Phase::Idle => BleState::Uninitialized,
            Phase::Ended => BleState::Ended,
            Phase::Serving => match self.link.connection() {
                ConnectionState::Connected => BleState::Connected,
                ConnectionState::Disconnected => BleState::Advertising,
            },
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.connection() == ConnectionState::Connected
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn notify_delay_ms(&self) -> u32 {
        self.notify_delay_ms
    }

    /// Minimum spacing kept after each notification.
    pub fn set_notify_delay(&mut self, ms: u32) {
        self.notify_delay_ms = ms;
    }

    pub fn set_name(&mut self, name: &str) -> Result<(), Error> {
        self.unlocked()?.set_name(name)
    }

    pub fn set_manufacturer(&mut self, manufacturer: &str) -> Result<(), Error> {
        self.unlocked()?.set_manufacturer(manufacturer)
    }

    pub fn set_vendor_id(&mut self, vendor_id: u16) -> Result<(), Error> {
        self.unlocked()?.set_vendor_id(vendor_id);
        Ok(())
    }

    pub fn set_product_id(&mut self, product_id: u16) -> Result<(), Error> {
        self.unlocked()?.set_product_id(product_id);
        Ok(())
    }

    pub fn set_version(&mut self, version: u16) -> Result<(), Error> {
        self.unlocked()?.set_version(version);
        Ok(())
    }

    /// Identity is fixed once advertising has begun.
    fn unlocked(&mut self) -> Result<&mut DeviceIdentity, Error> {
        match self.phase {
            Phase::Idle => Ok(&mut self.identity),
            _ => Err(Error::IdentityLocked),
        }
    }
}

impl<G: GattPort, P: Pacer> Transport for BleTransport<'_, G, P> {
    fn begin(&mut self) -> Result<(), Error> {
        if self.phase != Phase::Idle {
            return Err(Error::AlreadyStarted);
        }

        self.gatt.set_security(REQUIRED_SECURITY);
        self.gatt.publish(&self.identity, VOLUME_REPORT_DESCRIPTOR)?;

        self.phase = Phase::Serving;
        self.link.set_serving(true);

        match self.gatt.start_advertising() {
            Ok(()) => info!("BLE advertising as {=str}", self.identity.name()),
            Err(_e) => warn!("BLE advertising failed to start: {}", _e),
        }

        if let Err(_e) = self.gatt.set_battery_level(self.identity.battery_level()) {
            warn!("BLE battery level publish failed: {}", _e);
        }
        Ok(())
    }

    async fn send_report(&mut self, report: &VolumeReport) {
        if self.phase != Phase::Serving || !self.is_connected() {
            return;
        }

        if let Err(_e) = self.gatt.set_report_value(VOLUME_REPORT_ID, report.payload()) {
            warn!("BLE report value write failed: {}", _e);
            return;
        }
        if !self.link.is_subscribed() {
            debug!("BLE host not subscribed - notify skipped");
            return;
        }
        if let Err(_e) = self.gatt.notify(VOLUME_REPORT_ID) {
            warn!("BLE notify failed: {}", _e);
        }

        // Keep the host's notification queue from overrunning.
        self.pacer.pause(self.notify_delay_ms).await;
    }

    fn set_battery_level(&mut self, level: u8) -> Result<(), Error> {
        self.identity.set_battery_level(level)?;
        if self.phase == Phase::Serving {
            if let Err(_e) = self.gatt.set_battery_level(level) {
                warn!("BLE battery level update failed: {}", _e);
            }
        }
        Ok(())
    }

    fn end(&mut self) {
        if self.phase == Phase::Serving {
            self.gatt.set_notifications(VOLUME_REPORT_ID, false);
        }
        self.phase = Phase::Ended;
        self.link.set_serving(false);
        info!("BLE transport ended");
    }
}
