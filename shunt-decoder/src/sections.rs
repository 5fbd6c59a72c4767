//! Register sections and their field layouts
//!
//! A section is a register range the router reads in one request, paired with
//! the decoder for the response. Offsets below index the full response buffer
//! `[device_id, function, byte_count, data..., crc_lo, crc_hi]`.

use crate::codec::{decode_gated, decode_int, decode_raw, decode_text, derived_watts};
use crate::types::{DecodeError, Frame, Sample};

/// Field names produced by the section decoders
pub mod fields {
    pub const DISCHARGE_AMPS: &str = "discharge_amps";
    pub const CHARGE_BATTERY_VOLTAGE: &str = "charge_battery_voltage";
    pub const STARTER_BATTERY_VOLTAGE: &str = "starter_battery_voltage";
    pub const DISCHARGE_WATTS: &str = "discharge_watts";
    pub const TEMPERATURE_SENSOR_1: &str = "temperature_sensor_1";
    pub const TEMPERATURE_SENSOR_2: &str = "temperature_sensor_2";
    pub const FUNCTION: &str = "function";
    pub const MODEL: &str = "model";
    pub const DEVICE_ID: &str = "device_id";
    pub const LOAD_STATUS: &str = "load_status";
}

pub const SHUNT_INFO_REGISTER: u16 = 256;
pub const SHUNT_INFO_WORDS: u16 = 110;
pub const DEVICE_INFO_REGISTER: u16 = 12;
pub const DEVICE_INFO_WORDS: u16 = 8;
pub const DEVICE_ADDRESS_REGISTER: u16 = 26;
pub const DEVICE_ADDRESS_WORDS: u16 = 1;

/// Which decoder handles a section's response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    /// Model string and function name
    DeviceInfo,
    /// Configured Modbus address
    DeviceAddress,
    /// Live shunt telemetry; the monitored section
    ShuntInfo,
}

/// A register range read in one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    pub register: u16,
    pub words: u16,
    pub kind: SectionKind,
}

impl Section {
    pub fn new(register: u16, words: u16, kind: SectionKind) -> Self {
        Self { register, words, kind }
    }

    pub fn shunt_info() -> Self {
        Self::new(SHUNT_INFO_REGISTER, SHUNT_INFO_WORDS, SectionKind::ShuntInfo)
    }

    pub fn device_info() -> Self {
        Self::new(DEVICE_INFO_REGISTER, DEVICE_INFO_WORDS, SectionKind::DeviceInfo)
    }

    pub fn device_address() -> Self {
        Self::new(DEVICE_ADDRESS_REGISTER, DEVICE_ADDRESS_WORDS, SectionKind::DeviceAddress)
    }

    /// Data bytes announced in byte 2 of the response
    pub fn byte_count(&self) -> usize {
        self.words as usize * 2
    }

    /// Total response length including address, function, count and CRC
    pub fn response_len(&self) -> usize {
        self.byte_count() + 5
    }

    /// Whether responses to this section feed the discovery scanner
    pub fn is_monitored(&self) -> bool {
        self.kind == SectionKind::ShuntInfo
    }

    /// Decode the section's fields from a response frame
    pub fn decode(&self, frame: &Frame<'_>) -> Result<Sample, DecodeError> {
        match self.kind {
            SectionKind::ShuntInfo => decode_shunt_info(frame.bytes),
            SectionKind::DeviceInfo => decode_device_info(frame),
            SectionKind::DeviceAddress => decode_device_address(frame.bytes),
        }
    }
}

fn decode_shunt_info(bs: &[u8]) -> Result<Sample, DecodeError> {
    let mut sample = Sample::new();

    let charge_battery_voltage = decode_int(bs, 25, 3, 0.001, false)?;
    let starter_battery_voltage = decode_int(bs, 30, 2, 0.001, false)?;
    let discharge_amps = decode_int(bs, 21, 3, 0.001, true)?;

    sample.insert(fields::CHARGE_BATTERY_VOLTAGE, charge_battery_voltage);
    sample.insert(fields::STARTER_BATTERY_VOLTAGE, starter_battery_voltage);
    sample.insert(fields::DISCHARGE_AMPS, discharge_amps);
    sample.insert(
        fields::DISCHARGE_WATTS,
        derived_watts(charge_battery_voltage, discharge_amps),
    );
    sample.insert(fields::TEMPERATURE_SENSOR_1, decode_gated(bs, 67, 66, 3, 0.001)?);
    sample.insert(fields::TEMPERATURE_SENSOR_2, decode_gated(bs, 71, 70, 3, 0.001)?);

    Ok(sample)
}

fn decode_device_info(frame: &Frame<'_>) -> Result<Sample, DecodeError> {
    let mut sample = Sample::new();
    if let Some(name) = frame.function.name() {
        sample.insert(fields::FUNCTION, name.to_string());
    }
    sample.insert(fields::MODEL, decode_text(frame.bytes, 3, 17)?);
    Ok(sample)
}

fn decode_device_address(bs: &[u8]) -> Result<Sample, DecodeError> {
    let mut sample = Sample::new();
    sample.insert(fields::DEVICE_ID, decode_raw(bs, 4, 1, false)? as f64);
    Ok(sample)
}

/// Decoded write acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteAck {
    pub register: u16,
    pub load_status: u8,
}

/// Decode the echo a device sends after a single-register write
///
/// Layout: `[device_id, 6, reg_hi, reg_lo, value_hi, value_lo, crc_lo, crc_hi]`.
pub fn decode_write_ack(frame: &Frame<'_>) -> Result<WriteAck, DecodeError> {
    let register = decode_raw(frame.bytes, 2, 2, false)? as u16;
    let load_status = decode_raw(frame.bytes, 5, 1, false)? as u8;
    Ok(WriteAck { register, load_status })
}

/// Registered sections, looked up by request shape or response size
#[derive(Debug, Clone, Default)]
pub struct SectionTable {
    sections: Vec<Section>,
}

impl SectionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// The table used for the shunt: only the telemetry section
    pub fn shunt() -> Self {
        let mut table = Self::new();
        table.add(Section::shunt_info());
        table
    }

    /// Register a section, replacing one with the same register and size
    pub fn add(&mut self, section: Section) {
        if let Some(existing) = self
            .sections
            .iter_mut()
            .find(|s| s.register == section.register && s.words == section.words)
        {
            log::debug!(
                "Replacing section at register {} ({} words)",
                section.register,
                section.words
            );
            *existing = section;
        } else {
            self.sections.push(section);
        }
    }

    /// Look up a section by the request that produced the response
    pub fn get(&self, register: u16, words: u16) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| s.register == register && s.words == words)
    }

    /// Look up the unique section whose responses carry `byte_count` data bytes
    pub fn find_by_byte_count(&self, byte_count: usize) -> Option<&Section> {
        let mut matches = self.sections.iter().filter(|s| s.byte_count() == byte_count);
        let first = matches.next()?;
        if matches.next().is_some() {
            log::warn!("Ambiguous response size {} bytes matches several sections", byte_count);
            return None;
        }
        Some(first)
    }

    pub fn get_index(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}
