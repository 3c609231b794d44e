//! HID report types shared by both transports.
//!
//! The volume array is one input report: a report ID followed by one byte
//! per slider. BLE and USB publish the same report descriptor so the host
//! driver reads channels in the same order whichever link is active.

pub mod descriptor;
pub mod volume;

pub use descriptor::{ReportDescriptorSet, HID_INFORMATION, VOLUME_REPORT_DESCRIPTOR};
pub use volume::{ReportAssembler, VolumeReport, VOLUME_REPORT_SIZE};
