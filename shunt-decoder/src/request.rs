//! Request frame construction
//!
//! Every request the shunt understands is an 8-byte Modbus RTU frame:
//! `[device_id, function, reg_hi, reg_lo, value_hi, value_lo, crc_lo, crc_hi]`.
//! For reads `value` is the number of 16-bit words requested, for writes it is
//! the register value.

use crate::types::FunctionCode;
use crc::{Crc, CRC_16_MODBUS};

const MODBUS: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Length of every request frame
pub const REQUEST_LEN: usize = 8;

/// CRC-16/MODBUS over `bytes`
pub fn crc16(bytes: &[u8]) -> u16 {
    MODBUS.checksum(bytes)
}

/// Check the trailing little-endian CRC of a complete frame
pub fn verify_crc(frame: &[u8]) -> bool {
    if frame.len() < 3 {
        return false;
    }
    let (body, tail) = frame.split_at(frame.len() - 2);
    let expected = u16::from_le_bytes([tail[0], tail[1]]);
    crc16(body) == expected
}

/// Build a request frame addressed at `register`
pub fn build_request(device_id: u8, function: FunctionCode, register: u16, value: u16) -> Vec<u8> {
    let mut frame = Vec::with_capacity(REQUEST_LEN);
    frame.push(device_id);
    frame.push(function.as_byte());
    frame.extend_from_slice(&register.to_be_bytes());
    frame.extend_from_slice(&value.to_be_bytes());

    let crc = crc16(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}

/// Read `words` registers starting at `register`
pub fn read_request(device_id: u8, register: u16, words: u16) -> Vec<u8> {
    build_request(device_id, FunctionCode::Read, register, words)
}

/// Write `value` into the single register `register`
pub fn write_request(device_id: u8, register: u16, value: u16) -> Vec<u8> {
    build_request(device_id, FunctionCode::Write, register, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc16_check_value() {
        // Catalogue check value for CRC-16/MODBUS
        assert_eq!(crc16(b"123456789"), 0x4B37);
    }

    #[test]
    fn test_read_request_layout() {
        let frame = read_request(0x01, 0x0000, 0x0001);
        assert_eq!(frame, vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x01, 0x84, 0x0A]);
    }

    #[test]
    fn test_write_request_layout() {
        let frame = write_request(0x30, 266, 1);
        assert_eq!(frame.len(), REQUEST_LEN);
        assert_eq!(&frame[..6], &[0x30, 0x06, 0x01, 0x0A, 0x00, 0x01]);
        assert!(verify_crc(&frame));
    }

    #[test]
    fn test_verify_crc_rejects_corruption() {
        let mut frame = read_request(0x30, 256, 110);
        assert!(verify_crc(&frame));
        frame[3] ^= 0x01;
        assert!(!verify_crc(&frame));
        assert!(!verify_crc(&[0x01, 0x02]));
    }
}
