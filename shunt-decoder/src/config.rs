//! Decoder configuration types
//!
//! This module defines the configuration the router and discovery engine need.
//! Loading it from disk is the application's job; the library only provides
//! serde support and validation.

use crate::types::{DecoderError, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::PathBuf;

/// Byte ranges of the shunt section that already have a documented meaning
pub const KNOWN_RANGES: [(usize, usize); 5] = [(21, 24), (25, 28), (30, 32), (66, 69), (70, 73)];

/// Configuration for the response router
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShuntConfig {
    /// Modbus address of the shunt
    #[serde(default = "default_device_id")]
    pub device_id: u8,

    /// Preferred temperature unit. Reserved: the decoders always report the
    /// raw sensor scale.
    #[serde(default)]
    pub temperature_unit: TemperatureUnit,

    /// Field discovery settings
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

impl Default for ShuntConfig {
    fn default() -> Self {
        Self {
            device_id: default_device_id(),
            temperature_unit: TemperatureUnit::default(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

fn default_device_id() -> u8 {
    255
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    C,
    F,
}

/// Settings for the exploratory byte scanner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Run a scan on every monitored section response
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum absolute delta classified as a trend
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Append-only CSV target for scan records
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,

    /// Half-open byte ranges excluded from scanning
    #[serde(default = "default_known_ranges")]
    pub known_ranges: Vec<(usize, usize)>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            threshold: default_threshold(),
            log_path: default_log_path(),
            known_ranges: default_known_ranges(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_threshold() -> f64 {
    0.1
}

fn default_log_path() -> PathBuf {
    PathBuf::from("renogy_scan.csv")
}

fn default_known_ranges() -> Vec<(usize, usize)> {
    KNOWN_RANGES.to_vec()
}

impl DiscoveryConfig {
    /// Known ranges as `Range<usize>` values
    pub fn ranges(&self) -> Vec<Range<usize>> {
        self.known_ranges.iter().map(|&(start, end)| start..end).collect()
    }
}

impl ShuntConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the device address
    pub fn with_device_id(mut self, device_id: u8) -> Self {
        self.device_id = device_id;
        self
    }

    /// Builder method: set the temperature unit preference
    pub fn with_temperature_unit(mut self, unit: TemperatureUnit) -> Self {
        self.temperature_unit = unit;
        self
    }

    /// Builder method: enable or disable field discovery
    pub fn with_discovery(mut self, enabled: bool) -> Self {
        self.discovery.enabled = enabled;
        self
    }

    /// Builder method: set the trend threshold
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.discovery.threshold = threshold;
        self
    }

    /// Builder method: set the scan log path
    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.discovery.log_path = path.into();
        self
    }

    /// Reject thresholds and ranges the scanner cannot work with
    pub fn validate(&self) -> Result<()> {
        let threshold = self.discovery.threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(DecoderError::Config(format!(
                "discovery threshold must be a non-negative number, got {}",
                threshold
            )));
        }

        for &(start, end) in &self.discovery.known_ranges {
            if start >= end {
                return Err(DecoderError::Config(format!(
                    "known range [{}, {}) is empty",
                    start, end
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ShuntConfig::new();
        assert_eq!(config.device_id, 255);
        assert_eq!(config.temperature_unit, TemperatureUnit::C);
        assert!(config.discovery.enabled);
        assert_eq!(config.discovery.threshold, 0.1);
        assert_eq!(config.discovery.ranges()[0], 21..24);
        assert_eq!(config.discovery.ranges().len(), 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ShuntConfig::new()
            .with_device_id(0x30)
            .with_temperature_unit(TemperatureUnit::F)
            .with_discovery(false)
            .with_threshold(0.5)
            .with_log_path("/tmp/scan.csv");

        assert_eq!(config.device_id, 0x30);
        assert_eq!(config.temperature_unit, TemperatureUnit::F);
        assert!(!config.discovery.enabled);
        assert_eq!(config.discovery.threshold, 0.5);
        assert_eq!(config.discovery.log_path, PathBuf::from("/tmp/scan.csv"));
    }

    #[test]
    fn test_validation() {
        assert!(ShuntConfig::new().with_threshold(-1.0).validate().is_err());
        assert!(ShuntConfig::new().with_threshold(f64::NAN).validate().is_err());

        let mut config = ShuntConfig::new();
        config.discovery.known_ranges.push((40, 40));
        assert!(matches!(config.validate(), Err(DecoderError::Config(_))));
    }
}
