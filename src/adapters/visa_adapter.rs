//! VISA Hardware Adapter for GPIB/USB/Ethernet instruments
//!
//! Provides a [`ScpiTransport`] over a VISA session, supporting resource
//! strings and aliases such as:
//! - "RIGOL_DC_ELoad" (alias defined in the VISA configuration)
//! - "USB0::0x1AB1::0x0E11::DL3A000000::INSTR" (USB)
//! - "TCPIP0::192.168.1.100::INSTR" (Ethernet/LXI)

use super::ScpiTransport;
use anyhow::{anyhow, Context, Result};
use log::debug;
use std::ffi::CString;
use std::io::{BufRead, BufReader, Write};
use std::time::Duration;
use visa_rs::prelude::*;

/// VISA adapter for instrument communication
pub struct VisaAdapter {
    /// VISA resource string (e.g., "GPIB0::1::INSTR")
    resource_string: String,

    /// Line terminator for commands (typically "\n" for SCPI)
    line_terminator: String,

    // Declared before the resource manager so the session closes first.
    // None once the session has been released.
    instrument: Option<Instrument>,
    _rm: DefaultRM,
}

impl VisaAdapter {
    /// Open a VISA session
    ///
    /// # Errors
    /// Returns error if the VISA runtime is missing or the resource cannot be opened
    pub fn open(resource_string: &str, timeout: Duration) -> Result<Self> {
        let rm = DefaultRM::new()
            .map_err(|e| anyhow!("Failed to initialize VISA resource manager: {:?}", e))?;
        let c_string = CString::new(resource_string).context("Failed to create CString")?;
        let instrument = rm
            .open(&c_string.into(), AccessMode::NO_LOCK, timeout)
            .map_err(|e| anyhow!("Failed to open VISA resource '{}': {:?}", resource_string, e))?;

        debug!("VISA session opened for {}", resource_string);
        Ok(Self {
            resource_string: resource_string.to_string(),
            line_terminator: "\n".to_string(),
            instrument: Some(instrument),
            _rm: rm,
        })
    }

    /// True while the VISA session is open.
    pub fn is_open(&self) -> bool {
        self.instrument.is_some()
    }

    fn session(&mut self) -> Result<&mut Instrument> {
        let resource = &self.resource_string;
        self.instrument
            .as_mut()
            .ok_or_else(|| anyhow!("VISA session for {} is closed", resource))
    }

    fn send(&mut self, command: &str) -> Result<()> {
        let command_str = format!("{}{}", command, self.line_terminator);
        self.session()?
            .write_all(command_str.as_bytes())
            .with_context(|| format!("VISA write failed for: {}", command))
    }
}

impl ScpiTransport for VisaAdapter {
    fn write_line(&mut self, command: &str) -> Result<()> {
        self.send(command)?;
        debug!("VISA command sent: {}", command);
        Ok(())
    }

    fn query(&mut self, command: &str) -> Result<String> {
        self.send(command)?;

        let mut response = String::new();
        {
            let instrument: &Instrument = self.session()?;
            let mut reader = BufReader::new(instrument);
            reader
                .read_line(&mut response)
                .with_context(|| format!("VISA query failed for: {}", command))?;
        }

        let response = response.trim().to_string();
        debug!("VISA query '{}' -> '{}'", command, response);
        Ok(response)
    }

    fn close(&mut self) -> Result<()> {
        if self.instrument.take().is_some() {
            debug!("VISA session for {} released", self.resource_string);
        }
        Ok(())
    }
}
