//! USB HID volume device.
//!
//! Initialises the Embassy USB stack on the nRF52840 hardware USB
//! peripheral and exposes one HID interface carrying the volume report.
//! Enumeration is held back until the transport activates the endpoint.

use core::sync::atomic::{AtomicBool, Ordering};

use deej_hid::config;
use deej_hid::hid::{VOLUME_REPORT_DESCRIPTOR, VOLUME_REPORT_SIZE};
use deej_hid::transport::usb::{HidEndpoint, UsbTransport};
use deej_hid::UsbError;
use defmt::{info, unwrap};
use embassy_executor::Spawner;
use embassy_nrf::usb::vbus_detect::HardwareVbusDetect;
use embassy_nrf::usb::Driver;
use embassy_nrf::{self, bind_interrupts, peripherals};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_usb::class::hid::{Config as HidConfig, HidWriter, State};
use embassy_usb::driver::EndpointError;
use embassy_usb::{Builder, Config, UsbDevice};
use static_cell::StaticCell;

bind_interrupts!(struct Irqs {
    USBD => embassy_nrf::usb::InterruptHandler<peripherals::USBD>;
    CLOCK_POWER => embassy_nrf::usb::vbus_detect::InterruptHandler;
});

type UsbDriver = Driver<'static, peripherals::USBD, HardwareVbusDetect>;

/// Interrupt-IN packet size; one volume report fits.
const HID_PACKET_SIZE: usize = 8;

static HID_STATE: StaticCell<State> = StaticCell::new();
static USB_CONFIG_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static USB_BOS_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static USB_MSOS_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static USB_CTRL_BUF: StaticCell<[u8; 128]> = StaticCell::new();
static USB_STATE_HANDLER: StaticCell<UsbStateHandler> = StaticCell::new();

static USB_CONFIGURED: AtomicBool = AtomicBool::new(false);
static USB_SUSPENDED: AtomicBool = AtomicBool::new(false);
static USB_START: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Tracks what the host has done to the bus.
struct UsbStateHandler;

impl embassy_usb::Handler for UsbStateHandler {
    fn reset(&mut self) {
        USB_CONFIGURED.store(false, Ordering::Release);
    }

    fn configured(&mut self, configured: bool) {
        USB_CONFIGURED.store(configured, Ordering::Release);
        info!("USB configured: {}", configured);
    }

    fn suspended(&mut self, suspended: bool) {
        USB_SUSPENDED.store(suspended, Ordering::Release);
        info!("USB suspended: {}", suspended);
    }
}

/// The volume HID interface.
pub struct UsbHidEndpoint {
    writer: HidWriter<'static, UsbDriver, HID_PACKET_SIZE>,
}

impl HidEndpoint for UsbHidEndpoint {
    fn activate(&mut self, report_descriptor: &[u8]) -> Result<(), UsbError> {
        // The class descriptor was fixed at build time; the registered set
        // must describe the same interface.
        if report_descriptor != VOLUME_REPORT_DESCRIPTOR {
            return Err(UsbError::DescriptorMismatch);
        }
        USB_START.signal(());
        Ok(())
    }

    fn is_ready(&self) -> bool {
        USB_CONFIGURED.load(Ordering::Acquire) && !USB_SUSPENDED.load(Ordering::Acquire)
    }

    async fn write(&mut self, report: &[u8]) -> Result<(), UsbError> {
        self.writer.write(report).await.map_err(|e| {
            if matches!(e, EndpointError::BufferOverflow) {
                UsbError::BufferOverflow
            } else {
                UsbError::Disabled
            }
        })
    }
}

/// Initialise the USB stack, spawn the device task and return the
/// transport.
///
/// Must be called exactly once.  All static buffers are consumed here.
pub fn init(spawner: Spawner, usbd: peripherals::USBD) -> UsbTransport<UsbHidEndpoint> {
    // Create the low-level USB driver with hardware VBUS detection.
    let driver = Driver::new(usbd, Irqs, HardwareVbusDetect::new(Irqs));

    let mut usb_config = Config::new(config::USB_VID, config::USB_PID);
    usb_config.manufacturer = Some(config::USB_MANUFACTURER);
    usb_config.product = Some(config::USB_PRODUCT);
    usb_config.serial_number = Some(config::USB_SERIAL_NUMBER);
    usb_config.max_power = 100; // mA
    usb_config.max_packet_size_0 = 64;

    let config_desc = USB_CONFIG_DESC.init([0u8; 256]);
    let bos_desc = USB_BOS_DESC.init([0u8; 256]);
    let msos_desc = USB_MSOS_DESC.init([0u8; 256]);
    let ctrl_buf = USB_CTRL_BUF.init([0u8; 128]);

    let mut builder = Builder::new(
        driver,
        usb_config,
        config_desc,
        bos_desc,
        msos_desc,
        ctrl_buf,
    );

    let handler = USB_STATE_HANDLER.init(UsbStateHandler);
    builder.handler(handler);

    let state = HID_STATE.init(State::new());
    let hid_config = HidConfig {
        report_descriptor: VOLUME_REPORT_DESCRIPTOR,
        request_handler: None,
        poll_ms: config::USB_HID_POLL_MS,
        max_packet_size: HID_PACKET_SIZE as u16,
    };
    let writer = HidWriter::new(&mut builder, state, hid_config);

    let device = builder.build();
    unwrap!(spawner.spawn(usb_device_task(device)));

    info!(
        "USB HID volume device initialised ({} byte reports)",
        VOLUME_REPORT_SIZE
    );
    UsbTransport::new(UsbHidEndpoint { writer })
}

/// Run the USB device stack once the transport has been started.
///
/// Handles enumeration, suspend/resume and endpoint servicing.
#[embassy_executor::task]
async fn usb_device_task(mut device: UsbDevice<'static, UsbDriver>) -> ! {
    USB_START.wait().await;
    info!("USB device task started");
    device.run().await
}
