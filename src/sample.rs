//! Slider sample truncation.
//!
//! The ADC produces samples of a configurable bit depth (10 bits on the
//! reference board). The HID report carries one byte per slider, so the
//! sample keeps its top eight bits.

/// Narrowest sample width that needs scaling.
const CHANNEL_BITS: u8 = 8;

/// Map a `bit_width`-bit ADC sample onto one report byte.
///
/// Wider samples are shifted right by `bit_width - 8` and masked to the
/// low byte; samples of eight bits or fewer pass through (masked to a
/// byte). A `value` wider than `bit_width` is not rejected - the masking
/// drops its high bits, so callers must keep samples in range.
pub fn truncate(value: u32, bit_width: u8) -> u8 {
    if bit_width > CHANNEL_BITS {
        let shift = u32::from(bit_width - CHANNEL_BITS);
        (value.checked_shr(shift).unwrap_or(0) & 0xFF) as u8
    } else {
        (value & 0xFF) as u8
    }
}
