//! Core types for the shunt decoder library
//!
//! This module defines the frames the transport delivers, the sample the router
//! accumulates, and the error taxonomy shared by every component.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Timestamp type used throughout the decoder
pub type Timestamp = DateTime<Local>;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Function code carried in byte 1 of every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionCode {
    /// Read holding registers (3)
    Read,
    /// Write single register (6)
    Write,
    /// Any other code; the router treats these as reads
    Other(u8),
}

impl FunctionCode {
    pub const READ: u8 = 3;
    pub const WRITE: u8 = 6;

    pub fn from_byte(code: u8) -> Self {
        match code {
            Self::READ => FunctionCode::Read,
            Self::WRITE => FunctionCode::Write,
            other => FunctionCode::Other(other),
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            FunctionCode::Read => Self::READ,
            FunctionCode::Write => Self::WRITE,
            FunctionCode::Other(code) => *code,
        }
    }

    /// Symbolic name for the two codes the device speaks
    pub fn name(&self) -> Option<&'static str> {
        match self {
            FunctionCode::Read => Some("READ"),
            FunctionCode::Write => Some("WRITE"),
            FunctionCode::Other(_) => None,
        }
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "0x{:02X}", self.as_byte()),
        }
    }
}

/// One response frame as delivered by the transport
///
/// Layout: `[device_id, function, ...body, crc_lo, crc_hi]`. Field offsets used
/// by the section decoders index this whole buffer, not just the body.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<'a> {
    pub device_id: u8,
    pub function: FunctionCode,
    pub bytes: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Split off the address and function bytes
    pub fn parse(bytes: &'a [u8]) -> std::result::Result<Self, DecodeError> {
        if bytes.len() < 2 {
            return Err(DecodeError::FrameTooShort {
                needed: 2,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            device_id: bytes[0],
            function: FunctionCode::from_byte(bytes[1]),
            bytes,
        })
    }

    /// Byte count announced by a read response (byte 2)
    pub fn byte_count(&self) -> Option<usize> {
        self.bytes.get(2).map(|b| *b as usize)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A single decoded field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Scaled numeric value
    Number(f64),
    /// Device identity strings (model name, function name)
    Text(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Number(_) => None,
            FieldValue::Text(s) => Some(s),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(v) => write!(f, "{}", v),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

/// Decoded fields accumulated over one read/write cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sample {
    fields: BTreeMap<String, FieldValue>,
}

impl Sample {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Numeric value of a field, `None` for missing or text fields
    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(FieldValue::as_f64)
    }

    /// Overlay another sample's fields onto this one
    pub fn merge(&mut self, other: Sample) {
        self.fields.extend(other.fields);
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }
}

/// Bounds or format violation while decoding a known field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Field at offset {offset} with width {width} exceeds buffer of {len} bytes")]
    OutOfBounds { offset: usize, width: usize, len: usize },

    #[error("Unsupported integer width: {0} bytes")]
    InvalidWidth(usize),

    #[error("Invalid text in bytes {start}..{end}: {reason}")]
    InvalidText { start: usize, end: usize, reason: String },

    #[error("Frame too short: need {needed} bytes, got {actual}")]
    FrameTooShort { needed: usize, actual: usize },
}

/// Failure reported by the transport collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Transport error: {0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors that can occur while decoding, dispatching or logging
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Failed to write scan log {path}: {reason}")]
    LogWrite { path: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_code_mapping() {
        assert_eq!(FunctionCode::from_byte(3), FunctionCode::Read);
        assert_eq!(FunctionCode::from_byte(6), FunctionCode::Write);
        assert_eq!(FunctionCode::from_byte(0x83), FunctionCode::Other(0x83));
        assert_eq!(FunctionCode::Other(0x83).as_byte(), 0x83);
        assert_eq!(FunctionCode::Read.name(), Some("READ"));
        assert_eq!(format!("{}", FunctionCode::Other(0x10)), "0x10");
    }

    #[test]
    fn test_frame_parse() {
        let bytes = [0x30, 0x03, 0x04, 0x00, 0x01, 0x00, 0x02, 0xAA, 0xBB];
        let frame = Frame::parse(&bytes).unwrap();
        assert_eq!(frame.device_id, 0x30);
        assert_eq!(frame.function, FunctionCode::Read);
        assert_eq!(frame.byte_count(), Some(4));

        assert!(matches!(
            Frame::parse(&[0x30]),
            Err(DecodeError::FrameTooShort { needed: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_sample_merge_overlays() {
        let mut sample = Sample::new();
        sample.insert("a", 1.0);
        sample.insert("b", 2.0);

        let mut update = Sample::new();
        update.insert("b", 3.0);
        update.insert("model", "RSHST-B02P300".to_string());
        sample.merge(update);

        assert_eq!(sample.len(), 3);
        assert_eq!(sample.number("b"), Some(3.0));
        assert_eq!(sample.number("model"), None);
        assert_eq!(sample.get("model").and_then(FieldValue::as_str), Some("RSHST-B02P300"));
    }
}
