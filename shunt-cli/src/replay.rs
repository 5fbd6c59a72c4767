//! Offline transport: replays captured response frames
//!
//! Capture files hold one response frame per line as hex. Blank lines and
//! lines starting with `#` are skipped; whitespace between bytes is ignored.

use anyhow::{Context, Result};
use shunt_decoder::{Transport, TransportError};
use std::fs;
use std::path::Path;

/// Records outgoing requests instead of putting them on a link
#[derive(Debug, Default)]
pub struct ReplayTransport {
    pub sent: Vec<Vec<u8>>,
}

impl Transport for ReplayTransport {
    fn send(&mut self, request: &[u8]) -> std::result::Result<(), TransportError> {
        log::info!("-> {}", hex::encode(request));
        self.sent.push(request.to_vec());
        Ok(())
    }
}

/// Parse the frames of a capture
pub fn parse_frames(content: &str) -> Result<Vec<Vec<u8>>> {
    let mut frames = Vec::new();

    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let digits: String = line.chars().filter(|c| !c.is_whitespace()).collect();
        let frame = hex::decode(&digits)
            .with_context(|| format!("Invalid hex on line {}", number + 1))?;
        frames.push(frame);
    }

    Ok(frames)
}

/// Load the frames of a capture file
pub fn load_frames(path: &Path) -> Result<Vec<Vec<u8>>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read capture file: {:?}", path))?;
    parse_frames(&content).with_context(|| format!("Failed to parse capture file: {:?}", path))
}
