//! Response dispatch
//!
//! The router is the entry point for everything the transport delivers. It
//! decodes each response by function code, accumulates section fields into the
//! current sample and hands the sample to the data callback once the device
//! acknowledges a write.
//!
//! ```no_run
//! use shunt_decoder::{ResponseRouter, ShuntConfig, Transport, TransportError};
//!
//! struct Link;
//! impl Transport for Link {
//!     fn send(&mut self, _request: &[u8]) -> Result<(), TransportError> {
//!         Ok(())
//!     }
//! }
//!
//! let mut router = ResponseRouter::new(ShuntConfig::new(), Link)
//!     .unwrap()
//!     .on_data(|sample| println!("{:?}", sample))
//!     .on_error(|err| eprintln!("{}", err));
//!
//! router.request_next_section().unwrap();
//! // ... transport calls router.on_frame(&bytes) for each response
//! router.set_load(1).unwrap();
//! ```

use crate::config::ShuntConfig;
use crate::discovery::{FieldDiscoveryEngine, ScanLog};
use crate::request::{read_request, write_request};
use crate::sections::{decode_write_ack, fields, Section, SectionTable};
use crate::types::{
    DecodeError, DecoderError, Frame, FunctionCode, Result, Sample, TransportError,
};

/// Register that switches the load output
pub const LOAD_REGISTER: u16 = 266;

/// Outbound half of the link to the device
///
/// Responses travel the other way: whoever owns the link calls
/// [`ResponseRouter::on_frame`] with each response's bytes.
pub trait Transport {
    fn send(&mut self, request: &[u8]) -> std::result::Result<(), TransportError>;
}

pub type DataCallback = Box<dyn FnMut(&Sample)>;
pub type ErrorCallback = Box<dyn FnMut(&DecoderError)>;

/// What a single frame did to the router state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterEvent {
    /// A read response was decoded and merged into the sample
    SectionDecoded { register: u16, fields: usize },
    /// A read response matched no registered section and was ignored
    UnknownSection { byte_count: Option<usize> },
    /// A write was acknowledged; the sample was delivered and cleared
    CycleComplete,
    /// A write was acknowledged after a failed read; the sample was dropped
    CycleDiscarded,
}

pub struct ResponseRouter<T: Transport> {
    config: ShuntConfig,
    transport: T,
    sections: SectionTable,
    sample: Sample,
    /// Section of the read request awaiting its response
    pending: Option<Section>,
    next_section: usize,
    /// Set when a read in the current cycle failed to decode
    cycle_aborted: bool,
    discovery: Option<(FieldDiscoveryEngine, ScanLog)>,
    on_data: Option<DataCallback>,
    on_error: Option<ErrorCallback>,
}

impl<T: Transport> ResponseRouter<T> {
    /// Create a router for the shunt telemetry section
    pub fn new(config: ShuntConfig, transport: T) -> Result<Self> {
        config.validate()?;

        let discovery = if config.discovery.enabled {
            log::debug!("Field discovery enabled, logging to {:?}", config.discovery.log_path);
            Some((
                FieldDiscoveryEngine::from_config(&config.discovery),
                ScanLog::new(config.discovery.log_path.clone()),
            ))
        } else {
            None
        };

        log::debug!(
            "Router for device 0x{:02X} (temperature unit {:?})",
            config.device_id,
            config.temperature_unit
        );

        Ok(Self {
            config,
            transport,
            sections: SectionTable::shunt(),
            sample: Sample::new(),
            pending: None,
            next_section: 0,
            cycle_aborted: false,
            discovery,
            on_data: None,
            on_error: None,
        })
    }

    /// Replace the registered sections
    pub fn with_sections(mut self, sections: SectionTable) -> Self {
        self.sections = sections;
        self.next_section = 0;
        self
    }

    /// Replace the discovery engine and its log target
    pub fn with_discovery(mut self, engine: FieldDiscoveryEngine, target: ScanLog) -> Self {
        self.discovery = Some((engine, target));
        self
    }

    pub fn without_discovery(mut self) -> Self {
        self.discovery = None;
        self
    }

    /// Called once per completed write cycle with the accumulated sample
    pub fn on_data(mut self, callback: impl FnMut(&Sample) + 'static) -> Self {
        self.on_data = Some(Box::new(callback));
        self
    }

    /// Called for every decode or transport failure
    pub fn on_error(mut self, callback: impl FnMut(&DecoderError) + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    pub fn config(&self) -> &ShuntConfig {
        &self.config
    }

    pub fn sample(&self) -> &Sample {
        &self.sample
    }

    pub fn sections(&self) -> &SectionTable {
        &self.sections
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn discovery(&self) -> Option<&FieldDiscoveryEngine> {
        self.discovery.as_ref().map(|(engine, _)| engine)
    }

    /// Detach the discovery engine, keeping its history
    pub fn take_discovery(&mut self) -> Option<FieldDiscoveryEngine> {
        self.discovery.take().map(|(engine, _)| engine)
    }

    /// Process one response frame
    pub fn on_frame(&mut self, bytes: &[u8]) -> Result<RouterEvent> {
        let frame = match Frame::parse(bytes) {
            Ok(frame) => frame,
            Err(e) => return Err(self.abort_cycle(e)),
        };

        match frame.function {
            FunctionCode::Write => self.handle_write(&frame),
            FunctionCode::Read => self.handle_read(&frame),
            // Anything else is decoded as a read response
            FunctionCode::Other(code) => {
                log::debug!("Function code 0x{:02X} handled as READ", code);
                self.handle_read(&frame)
            }
        }
    }

    fn handle_write(&mut self, frame: &Frame<'_>) -> Result<RouterEvent> {
        let ack = match decode_write_ack(frame) {
            Ok(ack) => ack,
            Err(e) => {
                // The sample survives until a write is acknowledged cleanly
                log::warn!("Undecodable write acknowledgement, keeping sample: {}", e);
                return Err(self.fail(e.into()));
            }
        };

        if self.cycle_aborted {
            log::warn!("Dropping sample of a cycle with a failed read");
            self.sample.clear();
            self.cycle_aborted = false;
            return Ok(RouterEvent::CycleDiscarded);
        }

        self.sample.insert(fields::LOAD_STATUS, ack.load_status as f64);
        log::info!("Write operation complete (register {})", ack.register);

        if let Some(callback) = self.on_data.as_mut() {
            callback(&self.sample);
        }
        self.sample.clear();

        Ok(RouterEvent::CycleComplete)
    }

    fn handle_read(&mut self, frame: &Frame<'_>) -> Result<RouterEvent> {
        let section = self.resolve_section(frame);
        self.pending = None;

        let Some(section) = section else {
            log::warn!(
                "No section registered for a {}-byte response, ignoring",
                frame.len()
            );
            return Ok(RouterEvent::UnknownSection {
                byte_count: frame.byte_count(),
            });
        };

        let decoded = match section.decode(frame) {
            Ok(decoded) => decoded,
            Err(e) => return Err(self.abort_cycle(e)),
        };

        if section.is_monitored() {
            self.run_discovery(frame.bytes);
        }

        let count = decoded.len();
        self.sample.merge(decoded);
        log::debug!(
            "Decoded {} fields from register {}",
            count,
            section.register
        );

        Ok(RouterEvent::SectionDecoded {
            register: section.register,
            fields: count,
        })
    }

    /// Prefer the section of the outstanding request, fall back to response size
    fn resolve_section(&self, frame: &Frame<'_>) -> Option<Section> {
        let byte_count = frame.byte_count()?;

        if let Some(pending) = self.pending {
            if pending.byte_count() == byte_count {
                return Some(pending);
            }
            log::debug!(
                "Response of {} bytes does not match pending register {} ({} words)",
                byte_count,
                pending.register,
                pending.words
            );
        }

        self.sections.find_by_byte_count(byte_count).copied()
    }

    fn run_discovery(&mut self, bytes: &[u8]) {
        if let Some((engine, target)) = self.discovery.as_mut() {
            if let Err(e) = engine.scan_into(bytes, target) {
                log::error!("Field discovery scan failed: {}", e);
            }
        }
    }

    /// Request the next registered section, cycling through the table
    pub fn request_next_section(&mut self) -> Result<Section> {
        let count = self.sections.len();
        if count == 0 {
            return Err(DecoderError::Config("no sections registered".to_string()));
        }

        let index = self.next_section % count;
        let section = match self.sections.get_index(index) {
            Some(section) => *section,
            None => return Err(DecoderError::Config(format!("no section at index {}", index))),
        };
        self.next_section = (index + 1) % count;

        log::debug!(
            "Reading register {} ({} words)",
            section.register,
            section.words
        );
        let request = read_request(self.config.device_id, section.register, section.words);
        self.send(&request)?;
        self.pending = Some(section);
        Ok(section)
    }

    /// Switch the load output; range checks are left to the device
    pub fn set_load(&mut self, value: u16) -> Result<()> {
        log::info!("Setting load {}", value);
        let request = write_request(self.config.device_id, LOAD_REGISTER, value);
        self.send(&request)
    }

    /// Surface a failure the transport detected on its own
    pub fn report_transport_error(&mut self, err: TransportError) {
        log::error!("{}", err);
        self.fail(err.into());
    }

    fn send(&mut self, request: &[u8]) -> Result<()> {
        match self.transport.send(request) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e.into())),
        }
    }

    fn abort_cycle(&mut self, err: DecodeError) -> DecoderError {
        log::warn!("Aborting cycle: {}", err);
        self.cycle_aborted = true;
        self.fail(err.into())
    }

    fn fail(&mut self, err: DecoderError) -> DecoderError {
        if let Some(callback) = self.on_error.as_mut() {
            callback(&err);
        }
        err
    }
}
