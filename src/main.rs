//! deej-hid - slider volume mixer firmware for the nRF52840.
//!
//! Samples five analog sliders and publishes them to the host as a HID
//! volume array, over BLE (HID-over-GATT) or wired USB HID depending on
//! the enabled feature.
//!
//! Flash with `cargo run --release --features ble` (or `usb`).

#![no_std]
#![no_main]

#[cfg(all(feature = "ble", feature = "usb"))]
compile_error!("features `ble` and `usb` are mutually exclusive");

#[cfg(not(any(feature = "ble", feature = "usb")))]
compile_error!("enable one transport feature: `ble` or `usb`");

#[cfg(feature = "ble")]
mod ble;
mod sliders;
#[cfg(feature = "usb")]
mod usb;

use deej_hid::config::{SLIDER_ADC_BITS, SLIDER_SAMPLE_PERIOD_MS};
use deej_hid::{Mixer, Transport};
use defmt::{error, info, unwrap, warn};
use embassy_executor::Spawner;
use embassy_time::Timer;
use {defmt_rtt as _, panic_probe as _};

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_nrf::init(nrf_config());
    info!("deej-hid starting");

    #[cfg(feature = "ble")]
    let transport = {
        use deej_hid::config::{DEVICE_NAME, MANUFACTURER_NAME};
        use deej_hid::DeviceIdentity;

        let identity = unwrap!(DeviceIdentity::new(DEVICE_NAME, MANUFACTURER_NAME));
        ble::init(spawner, identity)
    };
    #[cfg(feature = "usb")]
    let transport = usb::init(spawner, p.USBD);

    let mut sliders =
        sliders::Sliders::new(p.SAADC, p.P0_02, p.P0_03, p.P0_04, p.P0_05, p.P0_28).await;

    run(transport, &mut sliders).await
}

/// Sampling loop: every pass updates all channels and offers one report.
async fn run<T: Transport>(transport: T, sliders: &mut sliders::Sliders) -> ! {
    let mut mixer = unwrap!(Mixer::new(transport, SLIDER_ADC_BITS));
    if let Err(e) = mixer.begin() {
        error!("transport failed to start: {}", e);
        defmt::panic!("cannot serve reports");
    }
    info!("mixer running ({}-bit sliders)", SLIDER_ADC_BITS);

    loop {
        let samples = sliders.sample().await;
        if let Err(e) = mixer.set_all(&samples).await {
            warn!("slider update rejected: {}", e);
        }
        Timer::after_millis(SLIDER_SAMPLE_PERIOD_MS).await;
    }
}

fn nrf_config() -> embassy_nrf::config::Config {
    let mut config = embassy_nrf::config::Config::default();

    // The SoftDevice owns priorities 0, 1 and 4.
    #[cfg(feature = "ble")]
    {
        use embassy_nrf::interrupt::Priority;
        config.gpiote_interrupt_priority = Priority::P2;
        config.time_interrupt_priority = Priority::P2;
    }

    // USB needs the crystal-backed HFCLK.
    #[cfg(feature = "usb")]
    {
        config.hfclk_source = embassy_nrf::config::HfclkSource::ExternalXtal;
    }

    config
}
