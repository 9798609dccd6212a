//! Serial telemetry sensor.
//!
//! The sensor emits one JSON object per line. A well-formed frame always
//! carries a numeric `current` field; anything else on a line is a transient
//! [`ProtocolError`], never a different schema.

use crate::adapters::LineSource;
use crate::error::ProtocolError;
use log::debug;
use serde::Deserialize;

/// One decoded sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TelemetryFrame {
    /// Measured current in amps.
    pub current: f64,
}

/// Decode one raw line into a frame.
pub fn decode_frame(raw: &[u8]) -> Result<TelemetryFrame, ProtocolError> {
    let line = std::str::from_utf8(raw).map_err(|_| ProtocolError::Encoding)?;
    let line = line.trim_end();
    if line.is_empty() {
        return Err(ProtocolError::Malformed {
            line: String::new(),
            reason: "empty line".to_string(),
        });
    }
    serde_json::from_str::<TelemetryFrame>(line).map_err(|e| ProtocolError::Malformed {
        line: line.to_string(),
        reason: e.to_string(),
    })
}

/// Line-oriented channel to the sensor with frame decoding.
pub struct TelemetryLink {
    port: String,
    source: Box<dyn LineSource>,
    open: bool,
}

impl TelemetryLink {
    /// Open link named after `port`.
    pub fn new(port: &str, source: Box<dyn LineSource>) -> Self {
        Self {
            port: port.to_string(),
            source,
            open: true,
        }
    }

    /// Port name, for diagnostics.
    pub fn port(&self) -> &str {
        &self.port
    }

    /// False once closed.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Drop stale buffered input, then read and decode exactly one line.
    pub fn read_frame(&mut self) -> Result<TelemetryFrame, ProtocolError> {
        if !self.open {
            return Err(ProtocolError::Closed);
        }
        self.source
            .clear_input()
            .map_err(|e| ProtocolError::Transport(format!("{:#}", e)))?;
        let raw = self
            .source
            .read_line()
            .map_err(|e| ProtocolError::Transport(format!("{:#}", e)))?;
        debug!("[{}] {}", self.port, String::from_utf8_lossy(&raw).trim_end());
        decode_frame(&raw)
    }

    /// Close the port. Safe to call more than once; only the first call can fail.
    pub fn close(&mut self) -> Result<(), ProtocolError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.source
            .close()
            .map_err(|e| ProtocolError::Transport(format!("{:#}", e)))
    }
}
