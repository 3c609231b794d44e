//! Volume-array report and the assembler that fills it from slider samples.

use crate::config::{CHANNEL_COUNT, VOLUME_REPORT_ID};
use crate::error::Error;
use crate::sample::truncate;

/// Wire size of one report: report ID + one byte per channel.
pub const VOLUME_REPORT_SIZE: usize = CHANNEL_COUNT + 1;

/// One HID volume-array payload, one byte per slider.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VolumeReport {
    channels: [u8; CHANNEL_COUNT],
}

impl VolumeReport {
    /// All sliders at zero.
    pub const fn new() -> Self {
        Self {
            channels: [0; CHANNEL_COUNT],
        }
    }

    /// Build a report from already-truncated channel values.
    pub const fn from_channels(channels: [u8; CHANNEL_COUNT]) -> Self {
        Self { channels }
    }

    /// Value of one channel, `None` past the end.
    pub fn channel(&self, index: usize) -> Option<u8> {
        self.channels.get(index).copied()
    }

    /// The payload as carried by the BLE input report characteristic
    /// (no report ID; the Report Reference descriptor carries it).
    pub fn payload(&self) -> &[u8; CHANNEL_COUNT] {
        &self.channels
    }

    /// Serialize to report-protocol bytes (report ID first).
    ///
    /// Returns the number of bytes written, or 0 if `buf` is too small.
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < VOLUME_REPORT_SIZE {
            return 0;
        }
        buf[0] = VOLUME_REPORT_ID;
        buf[1..VOLUME_REPORT_SIZE].copy_from_slice(&self.channels);
        VOLUME_REPORT_SIZE
    }

    fn set(&mut self, index: usize, value: u8) -> Result<(), Error> {
        let slot = self
            .channels
            .get_mut(index)
            .ok_or(Error::ChannelOutOfRange {
                index,
                len: CHANNEL_COUNT,
            })?;
        *slot = value;
        Ok(())
    }
}

/// Owns the single volume report and writes truncated samples into it.
///
/// No dirty tracking: every update is expected to be followed by a send.
#[derive(Clone, Debug)]
pub struct ReportAssembler {
    report: VolumeReport,
    adc_bits: u8,
}

impl ReportAssembler {
    /// Create an assembler for samples of `adc_bits` bits (1..=32).
    pub fn new(adc_bits: u8) -> Result<Self, Error> {
        if adc_bits == 0 || adc_bits > 32 {
            return Err(Error::InvalidBitWidth(adc_bits));
        }
        Ok(Self {
            report: VolumeReport::new(),
            adc_bits,
        })
    }

    pub fn adc_bits(&self) -> u8 {
        self.adc_bits
    }

    /// Truncate one slider sample into its channel.
    pub fn set_channel(&mut self, index: usize, sample: u32) -> Result<(), Error> {
        self.report.set(index, truncate(sample, self.adc_bits))
    }

    /// Truncate every slider in one pass.
    ///
    /// `samples` must hold exactly `CHANNEL_COUNT` values; on a length
    /// mismatch the report is left untouched.
    pub fn set_all(&mut self, samples: &[u32]) -> Result<(), Error> {
        if samples.len() != CHANNEL_COUNT {
            return Err(Error::LengthMismatch {
                expected: CHANNEL_COUNT,
                actual: samples.len(),
            });
        }
        for (slot, &sample) in self.report.channels.iter_mut().zip(samples) {
            *slot = truncate(sample, self.adc_bits);
        }
        Ok(())
    }

    pub fn report(&self) -> &VolumeReport {
        &self.report
    }
}
