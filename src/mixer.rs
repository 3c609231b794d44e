//! Device lifecycle: one report, one transport, a send after every update.

use crate::error::Error;
use crate::hid::{ReportAssembler, VolumeReport};
use crate::transport::Transport;

/// The slider mixer.
///
/// Generic over the transport so the BLE / USB choice is made at compile
/// time with no dynamic dispatch.
pub struct Mixer<T: Transport> {
    assembler: ReportAssembler,
    transport: T,
}

impl<T: Transport> Mixer<T> {
    /// Mixer for `adc_bits`-bit slider samples.
    pub fn new(transport: T, adc_bits: u8) -> Result<Self, Error> {
        Ok(Self {
            assembler: ReportAssembler::new(adc_bits)?,
            transport,
        })
    }

    /// Start the transport. Call once, before the sampling loop.
    pub fn begin(&mut self) -> Result<(), Error> {
        self.transport.begin()
    }

    /// Update one slider and send the report.
    pub async fn set_channel(&mut self, index: usize, sample: u32) -> Result<(), Error> {
        self.assembler.set_channel(index, sample)?;
        self.transport.send_report(self.assembler.report()).await;
        Ok(())
    }

    /// Update every slider from one sampling pass and send the report.
    pub async fn set_all(&mut self, samples: &[u32]) -> Result<(), Error> {
        self.assembler.set_all(samples)?;
        self.transport.send_report(self.assembler.report()).await;
        Ok(())
    }

    pub fn set_battery_level(&mut self, level: u8) -> Result<(), Error> {
        self.transport.set_battery_level(level)
    }

    pub fn report(&self) -> &VolumeReport {
        self.assembler.report()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Stop serving; see [`Transport::end`].
    pub fn end(&mut self) {
        self.transport.end();
    }
}
