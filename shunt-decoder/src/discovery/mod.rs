//! Field discovery
//!
//! Brute-forces every plausible integer decoding of the bytes nobody has
//! documented yet and tracks how each decoding moves between consecutive
//! frames. Real telemetry drifts smoothly; misaligned decodings jump around or
//! never move.
//!
//! For a buffer of `n` bytes a scan tries up to `n * 4 widths * 2 signs`
//! decodings and emits four scaled records for each, so roughly `32 * n`
//! records per scan. This is meant to run once per sample, not on a hot path.

pub mod scan_log;
pub mod table;

pub use self::scan_log::ScanLog;
pub use self::table::FieldTable;

use crate::codec::{decode_raw, round_to, VALUE_PRECISION};
use crate::config::DiscoveryConfig;
use crate::types::{DecodeError, Result, Timestamp};
use chrono::Local;
use std::fmt;
use std::ops::Range;

/// Integer widths tried at every offset
pub const CANDIDATE_WIDTHS: [usize; 4] = [1, 2, 3, 4];

/// Fixed-point scale applied to a raw integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scale {
    One,
    Tenth,
    Hundredth,
    Thousandth,
}

impl Scale {
    pub const ALL: [Scale; 4] = [Scale::One, Scale::Tenth, Scale::Hundredth, Scale::Thousandth];

    pub fn factor(&self) -> f64 {
        match self {
            Scale::One => 1.0,
            Scale::Tenth => 0.1,
            Scale::Hundredth => 0.01,
            Scale::Thousandth => 0.001,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scale::One => "1",
            Scale::Tenth => "0.1",
            Scale::Hundredth => "0.01",
            Scale::Thousandth => "0.001",
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One hypothesised decoding of a byte span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CandidateField {
    pub offset: usize,
    pub width: usize,
    pub signed: bool,
    pub scale: Scale,
}

impl CandidateField {
    pub fn new(offset: usize, width: usize, signed: bool, scale: Scale) -> Self {
        Self { offset, width, signed, scale }
    }

    /// Bytes covered by this candidate
    pub fn span(&self) -> Range<usize> {
        self.offset..self.offset + self.width
    }
}

/// Direction of a candidate's change since the previous scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    pub fn classify(delta: f64, threshold: f64) -> Self {
        if delta > threshold {
            Trend::Up
        } else if delta < -threshold {
            Trend::Down
        } else {
            Trend::Flat
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Trend::Up => "↑",
            Trend::Down => "↓",
            Trend::Flat => "=",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One candidate's value in one scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRecord {
    pub timestamp: Timestamp,
    pub field: CandidateField,
    /// Lowercase hex of the bytes under the candidate
    pub raw: String,
    pub value: f64,
    pub delta: f64,
    pub trend: Trend,
}

/// Why a decoding was not attempted or did not produce a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Width outside [`CANDIDATE_WIDTHS`]
    UnsupportedWidth(usize),
    /// The span runs into a documented field
    OverlapsKnownRange,
    /// The codec rejected the span
    Decode(DecodeError),
}

/// Result of trying one (offset, width, signedness) decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Decoded(i64),
    Skipped(SkipReason),
}

/// A decoding that produced no records in the last scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedAttempt {
    pub offset: usize,
    pub width: usize,
    pub signed: bool,
    pub reason: SkipReason,
}

/// Scanner state: exclusions, trend threshold and the per-candidate history
#[derive(Debug, Clone)]
pub struct FieldDiscoveryEngine {
    known_ranges: Vec<Range<usize>>,
    threshold: f64,
    table: FieldTable,
    skipped: Vec<SkippedAttempt>,
}

impl FieldDiscoveryEngine {
    pub fn new(known_ranges: Vec<Range<usize>>, threshold: f64) -> Self {
        Self {
            known_ranges,
            threshold,
            table: FieldTable::new(),
            skipped: Vec::new(),
        }
    }

    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self::new(config.ranges(), config.threshold)
    }

    /// Continue from an existing history instead of an empty one
    pub fn with_table(mut self, table: FieldTable) -> Self {
        self.table = table;
        self
    }

    pub fn table(&self) -> &FieldTable {
        &self.table
    }

    pub fn into_table(self) -> FieldTable {
        self.table
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn known_ranges(&self) -> &[Range<usize>] {
        &self.known_ranges
    }

    /// Attempts that were skipped during the most recent scan
    pub fn skipped(&self) -> &[SkippedAttempt] {
        &self.skipped
    }

    fn in_known_range(&self, offset: usize) -> bool {
        self.known_ranges.iter().any(|r| r.contains(&offset))
    }

    fn overlaps_known_range(&self, span: &Range<usize>) -> bool {
        self.known_ranges
            .iter()
            .any(|r| span.start < r.end && r.start < span.end)
    }

    /// Decode one candidate span without scaling
    pub fn try_decode(buf: &[u8], offset: usize, width: usize, signed: bool) -> AttemptOutcome {
        if !CANDIDATE_WIDTHS.contains(&width) {
            return AttemptOutcome::Skipped(SkipReason::UnsupportedWidth(width));
        }
        match decode_raw(buf, offset, width, signed) {
            Ok(raw) => AttemptOutcome::Decoded(raw),
            Err(e) => AttemptOutcome::Skipped(SkipReason::Decode(e)),
        }
    }

    /// Scan `buf` with the current local time as the record timestamp
    pub fn scan(&mut self, buf: &[u8]) -> Vec<ScanRecord> {
        self.scan_at(buf, Local::now())
    }

    /// Scan every undocumented span of `buf` and update the history
    ///
    /// Offsets inside a known range are skipped outright. Spans that start
    /// outside but run into a known range are recorded as skipped.
    pub fn scan_at(&mut self, buf: &[u8], timestamp: Timestamp) -> Vec<ScanRecord> {
        self.skipped.clear();
        let mut records = Vec::new();

        for offset in 0..buf.len() {
            if self.in_known_range(offset) {
                continue;
            }

            for width in CANDIDATE_WIDTHS {
                if offset + width > buf.len() {
                    continue;
                }

                let span = offset..offset + width;
                if self.overlaps_known_range(&span) {
                    self.skip(offset, width, false, SkipReason::OverlapsKnownRange);
                    self.skip(offset, width, true, SkipReason::OverlapsKnownRange);
                    continue;
                }

                let raw_hex = hex::encode(&buf[span]);

                for signed in [false, true] {
                    let raw = match Self::try_decode(buf, offset, width, signed) {
                        AttemptOutcome::Decoded(raw) => raw,
                        AttemptOutcome::Skipped(reason) => {
                            self.skip(offset, width, signed, reason);
                            continue;
                        }
                    };

                    for scale in Scale::ALL {
                        let field = CandidateField::new(offset, width, signed, scale);
                        let value = round_to(raw as f64 * scale.factor(), VALUE_PRECISION);
                        let delta = self.table.observe(field, value);

                        records.push(ScanRecord {
                            timestamp,
                            field,
                            raw: raw_hex.clone(),
                            value,
                            delta,
                            trend: Trend::classify(delta, self.threshold),
                        });
                    }
                }
            }
        }

        records
    }

    /// Scan `buf` and append the records to `target`
    ///
    /// A log failure fails this call only; the history has already been
    /// updated by then.
    pub fn scan_into(&mut self, buf: &[u8], target: &ScanLog) -> Result<usize> {
        let records = self.scan(buf);
        let written = target.append(&records)?;
        log::info!("Scan written with {} rows to {:?}", written, target.path());
        Ok(written)
    }

    fn skip(&mut self, offset: usize, width: usize, signed: bool, reason: SkipReason) {
        self.skipped.push(SkippedAttempt {
            offset,
            width,
            signed,
            reason,
        });
    }
}
