//! Battery Shunt Decoder Library
//!
//! Decodes the register responses of a battery-shunt monitor speaking a
//! Modbus-like request/response protocol (READ = 3, WRITE = 6).
//!
//! # Architecture
//!
//! - [`codec`] pulls typed, scaled values out of a response buffer
//! - [`sections`] maps register ranges to their field layouts
//! - [`router`] dispatches responses, accumulates a [`Sample`] and reports it
//!   when a write completes
//! - [`discovery`] brute-forces the undocumented bytes of the telemetry section
//!   and logs how every candidate decoding drifts between samples
//!
//! The library does NOT:
//! - Open or manage the radio/serial link (see [`Transport`])
//! - Retry requests or enforce timeouts
//! - Store samples anywhere except the diagnostic scan log
//!
//! # Example Usage
//!
//! ```no_run
//! use shunt_decoder::{ResponseRouter, ShuntConfig, Transport, TransportError};
//!
//! struct Printer;
//! impl Transport for Printer {
//!     fn send(&mut self, request: &[u8]) -> Result<(), TransportError> {
//!         println!("-> {:02x?}", request);
//!         Ok(())
//!     }
//! }
//!
//! let config = ShuntConfig::new().with_device_id(0x30).with_log_path("scan.csv");
//! let mut router = ResponseRouter::new(config, Printer)
//!     .unwrap()
//!     .on_data(|sample| println!("sample: {:?}", sample));
//!
//! let response: Vec<u8> = vec![/* bytes from the device */];
//! if let Err(e) = router.on_frame(&response) {
//!     eprintln!("Decode error: {}", e);
//! }
//! ```

// Public modules
pub mod codec;
pub mod config;
pub mod discovery;
pub mod request;
pub mod router;
pub mod sections;
pub mod types;

// Re-export main types for convenience
pub use config::{DiscoveryConfig, ShuntConfig, TemperatureUnit, KNOWN_RANGES};
pub use discovery::{
    AttemptOutcome, CandidateField, FieldDiscoveryEngine, FieldTable, Scale, ScanLog, ScanRecord,
    SkipReason, Trend,
};
pub use router::{ResponseRouter, RouterEvent, Transport, LOAD_REGISTER};
pub use sections::{Section, SectionKind, SectionTable};
pub use types::{
    DecodeError, DecoderError, FieldValue, Frame, FunctionCode, Result, Sample, Timestamp,
    TransportError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: the default table only carries the telemetry section
        let table = SectionTable::shunt();
        assert_eq!(table.len(), 1);
        assert!(table.get(256, 110).map(Section::is_monitored).unwrap_or(false));
    }
}
