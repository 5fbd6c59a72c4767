//! Configuration loading and parsing

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shunt_decoder::{DiscoveryConfig, Section, SectionTable, ShuntConfig, TemperatureUnit};
use std::fs;
use std::path::Path;

/// Main application configuration (loaded from shunt.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    #[serde(default = "default_device_id")]
    pub device_id: u8,
    #[serde(default)]
    pub temperature_unit: TemperatureUnit,
    /// Also decode the model and address sections
    #[serde(default)]
    pub read_identity: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_id: default_device_id(),
            temperature_unit: TemperatureUnit::default(),
            read_identity: false,
        }
    }
}

fn default_device_id() -> u8 {
    ShuntConfig::default().device_id
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Txt,
}

impl AppConfig {
    /// Library configuration for the router
    pub fn shunt_config(&self) -> ShuntConfig {
        ShuntConfig {
            device_id: self.device.device_id,
            temperature_unit: self.device.temperature_unit,
            discovery: self.discovery.clone(),
        }
    }

    /// Sections the router should recognise
    pub fn sections(&self) -> SectionTable {
        let mut table = SectionTable::shunt();
        if self.device.read_identity {
            table.add(Section::device_info());
            table.add(Section::device_address());
        }
        table
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config
        .shunt_config()
        .validate()
        .with_context(|| format!("Invalid config file: {:?}", path))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            [device]
            device_id = 48
            temperature_unit = "f"

            [discovery]
            threshold = 0.5
            log_path = "scan.csv"
            known_ranges = [[21, 24], [25, 28]]

            [output]
            format = "txt"
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.device.device_id, 48);
        assert_eq!(config.device.temperature_unit, TemperatureUnit::F);
        assert_eq!(config.output.format, OutputFormat::Txt);
        assert_eq!(config.sections().len(), 1);

        let shunt = config.shunt_config();
        assert!(shunt.discovery.enabled);
        assert_eq!(shunt.discovery.threshold, 0.5);
        assert_eq!(shunt.discovery.log_path, PathBuf::from("scan.csv"));
        assert_eq!(shunt.discovery.ranges(), vec![21..24, 25..28]);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.device.device_id, 255);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.discovery.known_ranges.len(), 5);
    }

    #[test]
    fn test_identity_sections() {
        let config: AppConfig = toml::from_str("[device]\nread_identity = true\n").unwrap();
        let sections = config.sections();
        assert_eq!(sections.len(), 3);
        assert!(sections.get(12, 8).is_some());
        assert!(sections.get(26, 1).is_some());
    }

    #[test]
    fn test_load_config_rejects_bad_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shunt.toml");
        fs::write(&path, "[discovery]\nthreshold = -1.0\n").unwrap();
        assert!(load_config(&path).is_err());

        fs::write(&path, "[device]\ndevice_id = 1\n").unwrap();
        assert_eq!(load_config(&path).unwrap().device.device_id, 1);
    }
}
