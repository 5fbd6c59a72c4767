//! Frame field codec
//!
//! Pure functions that pull typed values out of a response buffer: fixed-width
//! big-endian integers with optional sign and fixed-point scale, trimmed UTF-8
//! text, gated fields and derived arithmetic fields.

use crate::types::DecodeError;
use byteorder::{BigEndian, ByteOrder};

/// Decimal places kept for every decoded numeric value
pub const VALUE_PRECISION: i32 = 3;

/// Largest integer width `decode_raw` accepts, in bytes
pub const MAX_WIDTH: usize = 8;

/// Round to `places` decimal places, breaking exact ties towards the even digit
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    // + 0.0 folds -0.0 into 0.0
    (value * factor).round_ties_even() / factor + 0.0
}

fn check_bounds(buf: &[u8], offset: usize, width: usize) -> Result<(), DecodeError> {
    if width == 0 || width > MAX_WIDTH {
        return Err(DecodeError::InvalidWidth(width));
    }
    match offset.checked_add(width) {
        Some(end) if end <= buf.len() => Ok(()),
        _ => Err(DecodeError::OutOfBounds {
            offset,
            width,
            len: buf.len(),
        }),
    }
}

/// Read `width` bytes at `offset` as a big-endian integer
///
/// Signed values are two's complement over exactly `width` bytes, so
/// `[0xFF, 0xFF, 0xFF]` decodes to -1.
pub fn decode_raw(buf: &[u8], offset: usize, width: usize, signed: bool) -> Result<i64, DecodeError> {
    check_bounds(buf, offset, width)?;
    let bytes = &buf[offset..offset + width];

    if signed {
        Ok(BigEndian::read_int(bytes, width))
    } else {
        // Widths of 8 unsigned bytes wrap into the sign bit; nothing in the
        // shunt layout is that wide.
        Ok(BigEndian::read_uint(bytes, width) as i64)
    }
}

/// Decode a scaled integer field, rounded to [`VALUE_PRECISION`] places
pub fn decode_int(
    buf: &[u8],
    offset: usize,
    width: usize,
    scale: f64,
    signed: bool,
) -> Result<f64, DecodeError> {
    let raw = decode_raw(buf, offset, width, signed)?;
    Ok(round_to(raw as f64 * scale, VALUE_PRECISION))
}

/// Decode the UTF-8 text in `buf[start..end]` with surrounding whitespace trimmed
pub fn decode_text(buf: &[u8], start: usize, end: usize) -> Result<String, DecodeError> {
    if start > end || end > buf.len() {
        return Err(DecodeError::OutOfBounds {
            offset: start,
            width: end.saturating_sub(start),
            len: buf.len(),
        });
    }

    std::str::from_utf8(&buf[start..end])
        .map(|s| s.trim().to_string())
        .map_err(|e| DecodeError::InvalidText {
            start,
            end,
            reason: e.to_string(),
        })
}

/// Decode a field guarded by a presence byte
///
/// The gate byte is always read first as an unsigned 1-byte integer. A zero
/// gate reports the field as exactly 0.0 without touching the value region.
pub fn decode_gated(
    buf: &[u8],
    gate_offset: usize,
    value_offset: usize,
    width: usize,
    scale: f64,
) -> Result<f64, DecodeError> {
    let gate = decode_raw(buf, gate_offset, 1, false)?;
    if gate == 0 {
        return Ok(0.0);
    }
    decode_int(buf, value_offset, width, scale, false)
}

/// Discharge power from battery voltage and current, rounded to 2 places
pub fn derived_watts(volts: f64, amps: f64) -> f64 {
    round_to(volts * amps, 2)
}
