//! Append-only CSV log of scan records

use super::{Scale, ScanRecord};
use crate::types::{DecoderError, Result};
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Column header, written once when the log file is created
pub const HEADER: [&str; 9] = [
    "timestamp", "offset", "length", "signed", "scale", "raw", "value", "delta", "trend",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Serialize)]
struct ScanRow<'a> {
    timestamp: String,
    offset: usize,
    length: usize,
    signed: &'static str,
    scale: &'static str,
    raw: &'a str,
    value: String,
    delta: String,
    trend: &'static str,
}

impl<'a> From<&'a ScanRecord> for ScanRow<'a> {
    fn from(record: &'a ScanRecord) -> Self {
        Self {
            timestamp: record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            offset: record.field.offset,
            length: record.field.width,
            signed: if record.field.signed { "True" } else { "False" },
            scale: record.field.scale.as_str(),
            raw: &record.raw,
            value: format_number(record.value, record.field.scale),
            delta: format_number(record.delta, record.field.scale),
            trend: record.trend.symbol(),
        }
    }
}

/// Unit scale keeps integers integral (`13450`), fractional scales always
/// carry a decimal point (`1345.0`)
fn format_number(value: f64, scale: Scale) -> String {
    match scale {
        Scale::One => format!("{}", value as i64),
        _ => format!("{:?}", value),
    }
}

/// A CSV file that scan records are appended to
#[derive(Debug, Clone)]
pub struct ScanLog {
    path: PathBuf,
}

impl ScanLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `records`, writing the header first if the file is new
    ///
    /// Returns the number of rows written.
    pub fn append(&self, records: &[ScanRecord]) -> Result<usize> {
        let is_new = !self.path.exists();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.write_error(e))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if is_new {
            log::debug!("Creating scan log {:?}", self.path);
            writer.write_record(HEADER).map_err(|e| self.write_error(e))?;
        }

        for record in records {
            writer
                .serialize(ScanRow::from(record))
                .map_err(|e| self.write_error(e))?;
        }

        writer.flush().map_err(|e| self.write_error(e))?;
        Ok(records.len())
    }

    fn write_error(&self, err: impl std::fmt::Display) -> DecoderError {
        DecoderError::LogWrite {
            path: self.path.display().to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{CandidateField, Scale, Trend};
    use chrono::{Local, TimeZone};

    fn record(value: f64) -> ScanRecord {
        ScanRecord {
            timestamp: Local.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
            field: CandidateField::new(3, 2, true, Scale::Hundredth),
            raw: "ff38".to_string(),
            value,
            delta: 0.0,
            trend: Trend::Flat,
        }
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let log = ScanLog::new(dir.path().join("scan.csv"));

        assert_eq!(log.append(&[record(-2.0)]).unwrap(), 1);
        assert_eq!(log.append(&[record(-2.0), record(-2.0)]).unwrap(), 2);

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "timestamp,offset,length,signed,scale,raw,value,delta,trend");
        assert_eq!(lines[1], "2024-05-01 12:30:00,3,2,True,0.01,ff38,-2.0,0.0,=");
        assert_eq!(content.matches("timestamp").count(), 1);
    }

    #[test]
    fn test_number_columns_follow_scale() {
        let dir = tempfile::tempdir().unwrap();
        let log = ScanLog::new(dir.path().join("scan.csv"));

        let mut unit = record(13_450.0);
        unit.field = CandidateField::new(25, 3, false, Scale::One);
        unit.delta = 250.0;
        unit.trend = Trend::Up;
        let mut tenth = record(1345.0);
        tenth.field = CandidateField::new(25, 3, false, Scale::Tenth);
        tenth.delta = 25.0;

        log.append(&[unit, tenth]).unwrap();
        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert!(lines[1].ends_with(",25,3,False,1,ff38,13450,250,↑"), "{}", lines[1]);
        assert!(lines[2].ends_with(",25,3,False,0.1,ff38,1345.0,25.0,="), "{}", lines[2]);
    }

    #[test]
    fn test_existing_file_gets_no_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.csv");
        std::fs::write(&path, "").unwrap();

        ScanLog::new(&path).append(&[record(1.0)]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("timestamp"));
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn test_unwritable_target_is_log_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let log = ScanLog::new(dir.path().join("missing").join("scan.csv"));
        assert!(matches!(
            log.append(&[record(1.0)]),
            Err(DecoderError::LogWrite { .. })
        ));
    }
}
