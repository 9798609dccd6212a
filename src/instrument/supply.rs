//! Programmable power supply (Rigol DP800 series command set), channel 1.

use super::{parse_state, InstrumentLink};
use crate::error::InstrumentError;

/// Rigol DP800 power supply, channel 1.
pub struct PowerSupply {
    link: InstrumentLink,
}

impl PowerSupply {
    /// Supply over an identified link.
    pub fn new(link: InstrumentLink) -> Self {
        Self { link }
    }

    /// Underlying link.
    pub fn link(&self) -> &InstrumentLink {
        &self.link
    }

    /// Underlying link, for release.
    pub fn link_mut(&mut self) -> &mut InstrumentLink {
        &mut self.link
    }

    /// Restore factory defaults (`*RST`).
    pub fn reset(&mut self) -> Result<(), InstrumentError> {
        self.link.write("*RST")
    }

    /// Set the channel 1 output voltage.
    pub fn set_voltage(&mut self, volts: f64) -> Result<(), InstrumentError> {
        self.link.write(&format!(":VOLT {}", volts))
    }

    /// Set the channel 1 current limit.
    pub fn set_current_limit(&mut self, amps: f64) -> Result<(), InstrumentError> {
        self.link.write(&format!(":CURR {}", amps))
    }

    /// Switch channel 1 on.
    pub fn enable_output(&mut self) -> Result<(), InstrumentError> {
        self.link.write(":OUTP:STAT CH1,ON")
    }

    /// Switch channel 1 off.
    pub fn disable_output(&mut self) -> Result<(), InstrumentError> {
        self.link.write(":OUTP:STAT CH1,OFF")
    }

    /// Whether channel 1 output is on.
    pub fn output_enabled(&mut self) -> Result<bool, InstrumentError> {
        let command = ":OUTPut:STATe? CH1";
        let response = self.link.query(command)?;
        parse_state(&response).ok_or_else(|| self.link.unexpected(command, &response))
    }
}
