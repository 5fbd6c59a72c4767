// Property tests for the field codec
use proptest::prelude::*;
use shunt_decoder::codec::{decode_gated, decode_int, derived_watts};
use shunt_decoder::sections::fields;
use shunt_decoder::{Frame, Section};

fn encode(value: i64, width: usize) -> Vec<u8> {
    value.to_be_bytes()[8 - width..].to_vec()
}

proptest! {
    #[test]
    fn unsigned_round_trip(width in 1usize..=4, seed in any::<u32>()) {
        let max = (1u64 << (8 * width)) - 1;
        let value = (seed as u64 % (max + 1)) as i64;
        let bytes = encode(value, width);
        prop_assert_eq!(decode_int(&bytes, 0, width, 1.0, false).unwrap(), value as f64);
    }

    #[test]
    fn signed_round_trip(width in 1usize..=4, seed in any::<i32>()) {
        let bits = 8 * width as u32;
        let value = ((seed as i64) << (64 - bits)) >> (64 - bits);
        let bytes = encode(value, width);
        prop_assert_eq!(decode_int(&bytes, 0, width, 1.0, true).unwrap(), value as f64);
    }

    #[test]
    fn closed_gate_reports_zero(value in any::<[u8; 3]>()) {
        let mut bs = vec![0u8; Section::shunt_info().response_len()];
        bs[2] = 220;
        bs[66] = value[0];
        bs[68] = value[2];
        // Byte 67 doubles as the gate and stays zero
        prop_assert_eq!(decode_gated(&bs, 67, 66, 3, 0.001).unwrap(), 0.0);
    }

    #[test]
    fn watts_follow_volts_and_amps(volts in 0u32..0xFF_FFFF, amps in -0x7F_FFFFi32..0x7F_FFFF) {
        let mut bs = vec![0u8; Section::shunt_info().response_len()];
        bs[1] = 0x03;
        bs[2] = 220;
        bs[25..28].copy_from_slice(&volts.to_be_bytes()[1..]);
        bs[21..24].copy_from_slice(&amps.to_be_bytes()[1..]);

        let frame = Frame::parse(&bs).unwrap();
        let sample = Section::shunt_info().decode(&frame).unwrap();
        let v = sample.number(fields::CHARGE_BATTERY_VOLTAGE).unwrap();
        let a = sample.number(fields::DISCHARGE_AMPS).unwrap();
        prop_assert_eq!(sample.number(fields::DISCHARGE_WATTS), Some(derived_watts(v, a)));
    }
}
