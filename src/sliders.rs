//! Analog sliders on the nRF52840 SAADC.
//!
//! One single-ended channel per slider, sampled together in a single scan.

use deej_hid::config::{CHANNEL_COUNT, SLIDER_ADC_BITS};
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_nrf::saadc::{self, ChannelConfig, Resolution, Saadc};
use embassy_nrf::{bind_interrupts, peripherals};

bind_interrupts!(struct Irqs {
    SAADC => saadc::InterruptHandler;
});

pub struct Sliders {
    adc: Saadc<'static, CHANNEL_COUNT>,
}

impl Sliders {
    /// Slider wipers on AIN0..AIN3 (P0.02-P0.05) and AIN4 (P0.28).
    pub async fn new(
        saadc: peripherals::SAADC,
        s0: peripherals::P0_02,
        s1: peripherals::P0_03,
        s2: peripherals::P0_04,
        s3: peripherals::P0_05,
        s4: peripherals::P0_28,
    ) -> Self {
        let mut config = saadc::Config::default();
        config.resolution = resolution();

        let channels = [
            ChannelConfig::single_ended(s0),
            ChannelConfig::single_ended(s1),
            ChannelConfig::single_ended(s2),
            ChannelConfig::single_ended(s3),
            ChannelConfig::single_ended(s4),
        ];

        // Stay clear of the SoftDevice's reserved priorities.
        interrupt::SAADC.set_priority(Priority::P3);
        let adc = Saadc::new(saadc, Irqs, config, channels);
        adc.calibrate().await;

        Self { adc }
    }

    /// One scan; negative readings (wiper at ground plus offset) clamp to 0.
    pub async fn sample(&mut self) -> [u32; CHANNEL_COUNT] {
        let mut buf = [0i16; CHANNEL_COUNT];
        self.adc.sample(&mut buf).await;
        buf.map(|raw| raw.max(0) as u32)
    }
}

fn resolution() -> Resolution {
    match SLIDER_ADC_BITS {
        8 => Resolution::_8BIT,
        12 => Resolution::_12BIT,
        10 => Resolution::_10BIT,
        // Only 14 is left; `config` rejects other widths at compile time.
        _ => Resolution::_14BIT,
    }
}
